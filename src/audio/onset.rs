/// Flags sudden attacks by comparing successive frame loudness. The stored
/// previous loudness is the only state this owns.
pub struct OnsetDetector {
    attack_threshold_db: f32,
    previous_db: f32,
}

impl OnsetDetector {
    pub fn new(attack_threshold_db: f32) -> Self {
        Self {
            attack_threshold_db,
            // Start from the loudness floor so the very first audible frame
            // can register as an attack.
            previous_db: -120.0,
        }
    }

    pub fn process(&mut self, current_db: f32) -> bool {
        let onset = current_db - self.previous_db > self.attack_threshold_db;
        self.previous_db = current_db;
        onset
    }

    pub fn reset(&mut self) {
        self.previous_db = -120.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_jump_above_threshold() {
        let mut onset = OnsetDetector::new(6.0);
        onset.process(-40.0);
        assert!(onset.process(-30.0)); // +10 dB
    }

    #[test]
    fn ignores_jump_at_or_below_threshold() {
        let mut onset = OnsetDetector::new(6.0);
        onset.process(-40.0);
        assert!(!onset.process(-34.0)); // exactly +6 dB, not strictly above
        assert!(!onset.process(-33.0)); // +1 dB from the advanced state
    }

    #[test]
    fn previous_loudness_advances_every_call() {
        let mut onset = OnsetDetector::new(6.0);
        onset.process(-60.0);
        assert!(onset.process(-50.0));
        // Same level again: delta is now zero.
        assert!(!onset.process(-50.0));
    }

    #[test]
    fn first_audible_frame_after_reset_is_an_attack() {
        let mut onset = OnsetDetector::new(6.0);
        onset.process(-20.0);
        onset.reset();
        assert!(onset.process(-30.0));
    }
}
