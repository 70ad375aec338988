use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Pitch detector settings (search range and silence floor).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_noise_gate_db")]
    pub noise_gate_db: f32,
    #[serde(default = "default_min_frequency_hz")]
    pub min_frequency_hz: f32,
    #[serde(default = "default_max_frequency_hz")]
    pub max_frequency_hz: f32,
    /// Analysis window length in samples. Power of two, at least 256.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
}

/// Per-tick smoothing and onset settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f32,
    #[serde(default = "default_attack_threshold_db")]
    pub attack_threshold_db: f32,
    #[serde(default = "default_analysis_interval_ms")]
    pub analysis_interval_ms: u64,
}

/// Note state machine settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_clarity_threshold")]
    pub clarity_threshold: f32,
    #[serde(default = "default_stability_frames")]
    pub stability_frames: u32,
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,
    #[serde(default = "default_bend_range_semitones")]
    pub bend_range_semitones: f32,
    #[serde(default = "default_pitch_bend_enabled")]
    pub pitch_bend_enabled: bool,
    #[serde(default = "default_note_hysteresis_cents")]
    pub note_hysteresis_cents: f32,
    #[serde(default = "default_velocity_sensitivity")]
    pub velocity_sensitivity: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            noise_gate_db: default_noise_gate_db(),
            min_frequency_hz: default_min_frequency_hz(),
            max_frequency_hz: default_max_frequency_hz(),
            frame_size: default_frame_size(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: default_smoothing_factor(),
            attack_threshold_db: default_attack_threshold_db(),
            analysis_interval_ms: default_analysis_interval_ms(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            clarity_threshold: default_clarity_threshold(),
            stability_frames: default_stability_frames(),
            min_duration_ms: default_min_duration_ms(),
            bend_range_semitones: default_bend_range_semitones(),
            pitch_bend_enabled: default_pitch_bend_enabled(),
            note_hysteresis_cents: default_note_hysteresis_cents(),
            velocity_sensitivity: default_velocity_sensitivity(),
        }
    }
}

fn default_noise_gate_db() -> f32 { -50.0 }
fn default_min_frequency_hz() -> f32 { 60.0 }
fn default_max_frequency_hz() -> f32 { 1200.0 }
fn default_frame_size() -> usize { 2048 }
fn default_smoothing_factor() -> f32 { 0.6 }
fn default_attack_threshold_db() -> f32 { 6.0 }
fn default_analysis_interval_ms() -> u64 { 25 }
fn default_clarity_threshold() -> f32 { 0.5 }
fn default_stability_frames() -> u32 { 3 }
fn default_min_duration_ms() -> u64 { 80 }
fn default_bend_range_semitones() -> f32 { 2.0 }
fn default_pitch_bend_enabled() -> bool { true }
fn default_note_hysteresis_cents() -> f32 { 35.0 }
fn default_velocity_sensitivity() -> f32 { 4.0 }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_frequency_hz ({min} Hz) must be below max_frequency_hz ({max} Hz)")]
    FrequencyRange { min: f32, max: f32 },
    #[error("frame_size {0} must be a power of two of at least 256")]
    FrameSize(usize),
    #[error("smoothing_factor {0} must be in [0, 1)")]
    SmoothingFactor(f32),
    #[error("clarity_threshold {0} must be in [0, 1]")]
    ClarityThreshold(f32),
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("stability_frames must be at least 1")]
    StabilityFrames,
    #[error("analysis_interval_ms must be at least 1")]
    AnalysisInterval,
}

impl Config {
    /// Rejects contradictory settings once, before the pipeline is built.
    /// Per-tick code assumes a validated config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detector;
        if !(d.min_frequency_hz > 0.0) || d.min_frequency_hz >= d.max_frequency_hz {
            return Err(ConfigError::FrequencyRange {
                min: d.min_frequency_hz,
                max: d.max_frequency_hz,
            });
        }
        if d.frame_size < 256 || !d.frame_size.is_power_of_two() {
            return Err(ConfigError::FrameSize(d.frame_size));
        }
        let a = &self.analysis;
        if !(0.0..1.0).contains(&a.smoothing_factor) {
            return Err(ConfigError::SmoothingFactor(a.smoothing_factor));
        }
        if a.analysis_interval_ms == 0 {
            return Err(ConfigError::AnalysisInterval);
        }
        let t = &self.tracker;
        if !(0.0..=1.0).contains(&t.clarity_threshold) {
            return Err(ConfigError::ClarityThreshold(t.clarity_threshold));
        }
        if !(t.bend_range_semitones > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "bend_range_semitones",
                value: t.bend_range_semitones,
            });
        }
        if !(t.velocity_sensitivity > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "velocity_sensitivity",
                value: t.velocity_sensitivity,
            });
        }
        if t.note_hysteresis_cents < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "note_hysteresis_cents",
                value: t.note_hysteresis_cents,
            });
        }
        if t.stability_frames == 0 {
            return Err(ConfigError::StabilityFrames);
        }
        Ok(())
    }
}

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Looks for pitchwire.toml next to the invocation, then in the user
/// config directory.
pub fn discover_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("pitchwire.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("pitchwire").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            "[detector]\nnoise_gate_db = -42.0\n\n[tracker]\nstability_frames = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.detector.noise_gate_db, -42.0);
        assert_eq!(cfg.detector.frame_size, 2048);
        assert_eq!(cfg.tracker.stability_frames, 5);
        assert_eq!(cfg.analysis.analysis_interval_ms, 25);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_frequency_range() {
        let mut cfg = Config::default();
        cfg.detector.min_frequency_hz = 2000.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FrequencyRange { .. })
        ));
    }

    #[test]
    fn rejects_non_power_of_two_frame() {
        let mut cfg = Config::default();
        cfg.detector.frame_size = 1000;
        assert!(matches!(cfg.validate(), Err(ConfigError::FrameSize(1000))));
        cfg.detector.frame_size = 128;
        assert!(matches!(cfg.validate(), Err(ConfigError::FrameSize(128))));
    }

    #[test]
    fn rejects_out_of_range_smoothing() {
        let mut cfg = Config::default();
        cfg.analysis.smoothing_factor = 1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SmoothingFactor(_))
        ));
    }

    #[test]
    fn rejects_zero_stability() {
        let mut cfg = Config::default();
        cfg.tracker.stability_frames = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::StabilityFrames)));
    }
}
