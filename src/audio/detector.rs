use crate::audio::AudioFrame;
use crate::config::DetectorConfig;

/// Raw per-frame estimate. `frequency` is `None` below the noise gate or
/// when no usable periodicity was found; `clarity` accompanies a frequency.
#[derive(Clone, Copy, Debug, Default)]
pub struct PitchEstimate {
    pub frequency: Option<f32>,
    pub rms: f32,
    pub clarity: Option<f32>,
}

pub fn db_from_rms(rms: f32) -> f32 {
    20.0 * rms.max(1e-6).log10()
}

/// Time-domain autocorrelation pitch detector with parabolic sub-sample
/// refinement. Pure: no state survives between frames.
pub struct PitchDetector {
    config: DetectorConfig,
}

impl PitchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, frame: &AudioFrame) -> PitchEstimate {
        let samples = &frame.samples;
        let size = samples.len();
        if size == 0 {
            return PitchEstimate::default();
        }

        let rms = (samples.iter().map(|s| s * s).sum::<f32>() / size as f32).sqrt();

        // Cheap rejection: skip the O(n * lags) correlation below the gate.
        if db_from_rms(rms) < self.config.noise_gate_db {
            return PitchEstimate { frequency: None, rms, clarity: None };
        }

        let sample_rate = frame.sample_rate as f32;
        let min_lag = ((sample_rate / self.config.max_frequency_hz) as usize).max(1);
        let max_lag = ((sample_rate / self.config.min_frequency_hz) as usize).min(size - 1);
        if min_lag >= max_lag {
            return PitchEstimate { frequency: None, rms, clarity: None };
        }

        // Signal energy, the lag-0 correlation used to normalize clarity.
        let energy: f32 = samples.iter().map(|s| s * s).sum();

        let correlation: Vec<f32> = (min_lag..=max_lag)
            .map(|lag| {
                samples[..size - lag]
                    .iter()
                    .zip(&samples[lag..])
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect();

        // Walk past the zero-lag peak's shoulder; picking a maximum before
        // the first dip would lock onto a spurious near-zero lag.
        let mut dip = 0;
        while dip + 1 < correlation.len() && correlation[dip] > correlation[dip + 1] {
            dip += 1;
        }
        if dip + 1 >= correlation.len() {
            return PitchEstimate { frequency: None, rms, clarity: None };
        }

        let (peak_offset, &peak) = correlation[dip..]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, v)| (dip + i, v))
            .expect("non-empty correlation slice");
        let peak_lag = min_lag + peak_offset;
        if peak <= 0.0 {
            return PitchEstimate { frequency: None, rms, clarity: None };
        }

        let denom = if energy > 0.0 { energy } else { 1.0 };
        let clarity = (peak / denom).clamp(0.0, 1.0);

        let refined_lag = peak_lag as f32 + parabolic_offset(&correlation, peak_offset);
        let frequency = sample_rate / refined_lag;

        PitchEstimate { frequency: Some(frequency), rms, clarity: Some(clarity) }
    }
}

/// Sub-sample peak offset from the three correlation values around the
/// coarse maximum. Zero when the peak sits on the search boundary or the
/// curvature is numerically flat.
fn parabolic_offset(correlation: &[f32], peak: usize) -> f32 {
    if peak == 0 || peak + 1 >= correlation.len() {
        return 0.0;
    }
    let y1 = correlation[peak - 1];
    let y2 = correlation[peak];
    let y3 = correlation[peak + 1];
    let denom = y1 - 2.0 * y2 + y3;
    if denom.abs() <= 1e-6 {
        return 0.0;
    }
    0.5 * (y1 - y3) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;

    fn sine_frame(sample_rate: u32, frequency: f32, size: usize, amplitude: f32) -> AudioFrame {
        let samples = (0..size)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32)
                        .sin()
            })
            .collect();
        AudioFrame { samples, sample_rate }
    }

    fn detector() -> PitchDetector {
        PitchDetector::new(DetectorConfig::default())
    }

    #[test]
    fn detects_sine_within_one_percent() {
        for frequency in [82.4, 110.0, 220.0, 440.0, 523.25, 987.77] {
            let frame = sine_frame(44_100, frequency, 2048, 0.8);
            let estimate = detector().analyze(&frame);
            let detected = estimate.frequency.expect("pitch expected");
            let error = (detected - frequency).abs() / frequency;
            assert!(
                error < 0.01,
                "{} Hz detected as {} Hz ({:.2}% off)",
                frequency,
                detected,
                error * 100.0
            );
            // The unnormalized peak shrinks with the overlap (size - lag),
            // so the clarity floor scales with frequency.
            let clarity = estimate.clarity.unwrap();
            if frequency >= 400.0 {
                assert!(clarity > 0.9, "clarity {} for {} Hz", clarity, frequency);
            } else {
                assert!(clarity > 0.6, "clarity {} for {} Hz", clarity, frequency);
            }
        }
    }

    #[test]
    fn silent_frame_has_no_pitch() {
        let frame = AudioFrame { samples: vec![0.0; 2048], sample_rate: 44_100 };
        let estimate = detector().analyze(&frame);
        assert_eq!(estimate.frequency, None);
        assert_eq!(estimate.rms, 0.0);
    }

    #[test]
    fn empty_frame_does_not_panic() {
        let frame = AudioFrame { samples: Vec::new(), sample_rate: 44_100 };
        let estimate = detector().analyze(&frame);
        assert_eq!(estimate.frequency, None);
    }

    #[test]
    fn quiet_signal_is_gated() {
        // -50 dB gate; amplitude 1e-4 sits near -83 dB RMS.
        let frame = sine_frame(44_100, 440.0, 2048, 1e-4);
        let estimate = detector().analyze(&frame);
        assert_eq!(estimate.frequency, None);
        assert!(estimate.rms > 0.0);
    }

    #[test]
    fn frequency_outside_search_range_is_rejected_or_aliased() {
        // 30 Hz is below the 60 Hz floor; the longest searched lag cannot
        // represent it, so whatever comes back must be inside the range.
        let frame = sine_frame(44_100, 30.0, 2048, 0.8);
        let estimate = detector().analyze(&frame);
        if let Some(f) = estimate.frequency {
            assert!(f >= 59.0);
        }
    }

    #[test]
    fn sub_sample_refinement_beats_integer_lag() {
        // 441.5 Hz at 44.1 kHz falls between integer lags 99 and 100.
        let frequency = 441.5;
        let frame = sine_frame(44_100, frequency, 2048, 0.8);
        let detected = detector().analyze(&frame).frequency.unwrap();
        let coarse_err = (44_100.0 / 100.0 - frequency).abs();
        assert!((detected - frequency).abs() < coarse_err);
    }

    #[test]
    fn db_conversion_floors_at_silence() {
        assert!((db_from_rms(0.0) + 120.0).abs() < 1e-3);
        assert!((db_from_rms(1.0) - 0.0).abs() < 1e-5);
        assert!((db_from_rms(0.1) + 20.0).abs() < 1e-4);
    }
}
