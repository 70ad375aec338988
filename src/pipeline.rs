use std::time::Instant;

use crate::audio::detector::{db_from_rms, PitchDetector};
use crate::audio::onset::OnsetDetector;
use crate::audio::smoother::Smoother;
use crate::audio::AudioFrame;
use crate::config::{Config, ConfigError};
use crate::note::events::NoteEvent;
use crate::note::tracker::NoteTracker;

/// All cross-tick state in one place: detector, onset memory, smoothing
/// averages and the note state machine. One `tick` runs the whole
/// frame-to-events pass; ticks are strictly sequential.
pub struct Pipeline {
    detector: PitchDetector,
    onset: OnsetDetector,
    smoother: Smoother,
    tracker: NoteTracker,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            detector: PitchDetector::new(config.detector),
            onset: OnsetDetector::new(config.analysis.attack_threshold_db),
            smoother: Smoother::new(config.analysis.smoothing_factor),
            tracker: NoteTracker::new(config.tracker),
        })
    }

    pub fn tick(&mut self, frame: &AudioFrame, now: Instant) -> Vec<NoteEvent> {
        let estimate = self.detector.analyze(frame);
        let onset = self.onset.process(db_from_rms(estimate.rms));
        let smoothed = self.smoother.process(&estimate, onset);

        log::trace!(
            "tick: raw {:?} Hz rms {:.4} -> smoothed {:.1} Hz clarity {:.2} onset {}",
            estimate.frequency,
            estimate.rms,
            smoothed.frequency,
            smoothed.clarity,
            onset
        );

        let mut events = Vec::new();
        self.tracker
            .tick(smoothed, estimate.rms, onset, now, &mut events);
        events
    }

    /// Final pass on stop: closes any sounding note, recenters the bend
    /// and resets every piece of cross-tick state to its initial form.
    pub fn finish(&mut self) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        self.tracker.release(&mut events);
        self.smoother.reset();
        self.onset.reset();
        events
    }

    pub fn current_note(&self) -> Option<u8> {
        self.tracker.current_note()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine_frame(frequency: f32, amplitude: f32) -> AudioFrame {
        let sample_rate = 44_100;
        let samples = (0..2048)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32)
                        .sin()
            })
            .collect();
        AudioFrame { samples, sample_rate }
    }

    fn silent_frame() -> AudioFrame {
        AudioFrame { samples: vec![0.0; 2048], sample_rate: 44_100 }
    }

    #[test]
    fn sine_input_produces_one_note_on() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let base = Instant::now();
        let frame = sine_frame(440.0, 0.8);

        let mut note_ons = 0;
        for i in 0..10u64 {
            let events = pipeline.tick(&frame, base + Duration::from_millis(i * 25));
            note_ons += events
                .iter()
                .filter(|e| matches!(e, NoteEvent::NoteOn { note: 69, .. }))
                .count();
        }
        assert_eq!(note_ons, 1);
        assert_eq!(pipeline.current_note(), Some(69));
    }

    #[test]
    fn first_loud_frame_is_an_attack() {
        // Out of silence the loudness jump trips the onset detector, which
        // arms the tracker immediately.
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let events = pipeline.tick(&sine_frame(440.0, 0.8), Instant::now());
        assert!(events
            .iter()
            .any(|e| matches!(e, NoteEvent::NoteOn { note: 69, .. })));
    }

    #[test]
    fn silence_then_finish_is_clean() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let base = Instant::now();
        for i in 0..5u64 {
            pipeline.tick(&sine_frame(440.0, 0.8), base + Duration::from_millis(i * 25));
        }
        // Sustained silence past the minimum duration closes the note.
        let mut note_offs = 0;
        for i in 0..8u64 {
            let events =
                pipeline.tick(&silent_frame(), base + Duration::from_millis(300 + i * 25));
            note_offs += events
                .iter()
                .filter(|e| matches!(e, NoteEvent::NoteOff { .. }))
                .count();
        }
        assert_eq!(note_offs, 1);
        assert!(pipeline.finish().is_empty());
    }

    #[test]
    fn finish_releases_a_sounding_note() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let base = Instant::now();
        for i in 0..5u64 {
            pipeline.tick(&sine_frame(440.0, 0.8), base + Duration::from_millis(i * 25));
        }
        assert_eq!(pipeline.current_note(), Some(69));

        let events = pipeline.finish();
        assert_eq!(
            events,
            vec![
                NoteEvent::NoteOff { note: 69 },
                NoteEvent::PitchBend { value: 0 }
            ]
        );
        assert_eq!(pipeline.current_note(), None);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.detector.frame_size = 1000;
        assert!(Pipeline::new(&config).is_err());
    }
}
