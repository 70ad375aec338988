use crate::audio::detector::PitchEstimate;

/// Effective factor used when an attack or a large jump calls for a fast
/// snap to the new pitch.
const FAST_FACTOR: f32 = 0.15;
/// Frequency jump, in cents, beyond which the smoother stops damping.
const JUMP_CENTS: f32 = 80.0;

/// Exponentially-decayed pitch state. `frequency == 0.0` means silence.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmoothedPitch {
    pub frequency: f32,
    pub clarity: f32,
}

/// Adaptive exponential smoothing over frequency and clarity. The time
/// constant shortens on onsets and on jumps larger than [`JUMP_CENTS`] so
/// genuinely new pitches track quickly while sustained tones stay damped.
pub struct Smoother {
    base_factor: f32,
    state: SmoothedPitch,
}

impl Smoother {
    pub fn new(base_factor: f32) -> Self {
        Self { base_factor, state: SmoothedPitch::default() }
    }

    pub fn process(&mut self, raw: &PitchEstimate, onset: bool) -> SmoothedPitch {
        let raw_clarity = raw.clarity.unwrap_or(0.0);

        match raw.frequency {
            Some(frequency) => {
                let jumped = self.state.frequency > 0.0
                    && cents_between(self.state.frequency, frequency).abs() > JUMP_CENTS;
                let factor = if onset || jumped {
                    self.base_factor.min(FAST_FACTOR)
                } else {
                    self.base_factor
                };

                if self.state.frequency > 0.0 {
                    self.state.frequency =
                        factor * self.state.frequency + (1.0 - factor) * frequency;
                } else {
                    // Out of silence there is nothing to blend with.
                    self.state.frequency = frequency;
                }
                self.state.clarity = factor * self.state.clarity + (1.0 - factor) * raw_clarity;
            }
            None => {
                self.state.frequency = 0.0;
                self.state.clarity *= self.base_factor;
            }
        }

        self.state
    }

    pub fn reset(&mut self) {
        self.state = SmoothedPitch::default();
    }
}

pub fn cents_between(from_hz: f32, to_hz: f32) -> f32 {
    1200.0 * (to_hz / from_hz).log2()
}
