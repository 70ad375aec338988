use clap::Parser;
use std::path::PathBuf;

use crate::config::{AnalysisConfig, Config, DetectorConfig, TrackerConfig};

#[derive(Parser, Debug)]
#[command(name = "pitchwire", about = "Live monophonic audio to MIDI note converter")]
pub struct Cli {
    /// MIDI output port (index or name substring); events are logged when omitted
    #[arg(short, long)]
    pub midi_port: Option<String>,

    /// List available MIDI output ports and exit
    #[arg(long)]
    pub list_midi_ports: bool,

    /// Audio input device name substring (default input device when omitted)
    #[arg(long)]
    pub input_device: Option<String>,

    /// Stop after this many seconds (runs until Enter is pressed otherwise)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Config file path (pitchwire.toml is auto-detected when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Silence floor in dB; quieter frames are not analyzed
    #[arg(long, default_value_t = -50.0)]
    pub noise_gate_db: f32,

    /// Lowest detectable frequency in Hz
    #[arg(long, default_value_t = 60.0)]
    pub min_frequency_hz: f32,

    /// Highest detectable frequency in Hz
    #[arg(long, default_value_t = 1200.0)]
    pub max_frequency_hz: f32,

    /// Analysis window length in samples (power of two, at least 256)
    #[arg(long, default_value_t = 2048)]
    pub frame_size: usize,

    /// Base smoothing factor for pitch tracking (0.0-1.0)
    #[arg(long, default_value_t = 0.6)]
    pub smoothing_factor: f32,

    /// Loudness jump in dB that counts as a new attack
    #[arg(long, default_value_t = 6.0)]
    pub attack_threshold_db: f32,

    /// Milliseconds between analysis passes
    #[arg(long, default_value_t = 25)]
    pub analysis_interval_ms: u64,

    /// Minimum pitch confidence to accept a note (0.0-1.0)
    #[arg(long, default_value_t = 0.5)]
    pub clarity_threshold: f32,

    /// Consecutive agreeing frames before a note-on
    #[arg(long, default_value_t = 3)]
    pub stability_frames: u32,

    /// Debounce for note-off and short-note suppression, in milliseconds
    #[arg(long, default_value_t = 80)]
    pub min_duration_ms: u64,

    /// Full-scale pitch bend span in semitones
    #[arg(long, default_value_t = 2.0)]
    pub bend_range_semitones: f32,

    /// Disable continuous pitch bend output
    #[arg(long)]
    pub no_pitch_bend: bool,

    /// Cents tolerance for keeping the same note candidate
    #[arg(long, default_value_t = 35.0)]
    pub note_hysteresis_cents: f32,

    /// Scales frame RMS to note-on velocity
    #[arg(long, default_value_t = 4.0)]
    pub velocity_sensitivity: f32,
}

impl Cli {
    /// Merge: config file values apply only where the CLI is at its default.
    pub fn merge_config(&mut self, cfg: &Config) {
        if self.noise_gate_db == -50.0 {
            self.noise_gate_db = cfg.detector.noise_gate_db;
        }
        if self.min_frequency_hz == 60.0 {
            self.min_frequency_hz = cfg.detector.min_frequency_hz;
        }
        if self.max_frequency_hz == 1200.0 {
            self.max_frequency_hz = cfg.detector.max_frequency_hz;
        }
        if self.frame_size == 2048 {
            self.frame_size = cfg.detector.frame_size;
        }
        if self.smoothing_factor == 0.6 {
            self.smoothing_factor = cfg.analysis.smoothing_factor;
        }
        if self.attack_threshold_db == 6.0 {
            self.attack_threshold_db = cfg.analysis.attack_threshold_db;
        }
        if self.analysis_interval_ms == 25 {
            self.analysis_interval_ms = cfg.analysis.analysis_interval_ms;
        }
        if self.clarity_threshold == 0.5 {
            self.clarity_threshold = cfg.tracker.clarity_threshold;
        }
        if self.stability_frames == 3 {
            self.stability_frames = cfg.tracker.stability_frames;
        }
        if self.min_duration_ms == 80 {
            self.min_duration_ms = cfg.tracker.min_duration_ms;
        }
        if self.bend_range_semitones == 2.0 {
            self.bend_range_semitones = cfg.tracker.bend_range_semitones;
        }
        if !self.no_pitch_bend {
            self.no_pitch_bend = !cfg.tracker.pitch_bend_enabled;
        }
        if self.note_hysteresis_cents == 35.0 {
            self.note_hysteresis_cents = cfg.tracker.note_hysteresis_cents;
        }
        if self.velocity_sensitivity == 4.0 {
            self.velocity_sensitivity = cfg.tracker.velocity_sensitivity;
        }
    }

    pub fn to_config(&self) -> Config {
        Config {
            detector: DetectorConfig {
                noise_gate_db: self.noise_gate_db,
                min_frequency_hz: self.min_frequency_hz,
                max_frequency_hz: self.max_frequency_hz,
                frame_size: self.frame_size,
            },
            analysis: AnalysisConfig {
                smoothing_factor: self.smoothing_factor,
                attack_threshold_db: self.attack_threshold_db,
                analysis_interval_ms: self.analysis_interval_ms,
            },
            tracker: TrackerConfig {
                clarity_threshold: self.clarity_threshold,
                stability_frames: self.stability_frames,
                min_duration_ms: self.min_duration_ms,
                bend_range_semitones: self.bend_range_semitones,
                pitch_bend_enabled: !self.no_pitch_bend,
                note_hysteresis_cents: self.note_hysteresis_cents,
                velocity_sensitivity: self.velocity_sensitivity,
            },
        }
    }
}
