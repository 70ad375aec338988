use std::fmt;

pub const BEND_MIN: i32 = -8192;
pub const BEND_MAX: i32 = 8191;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A note event headed for the MIDI output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Bend value in [-8192, 8191], 0 = centered.
    PitchBend { value: i32 },
}

impl NoteEvent {
    /// Raw MIDI bytes for channel 1, matching what a synth expects on the wire.
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            NoteEvent::NoteOn { note, velocity } => [0x90, note, velocity],
            NoteEvent::NoteOff { note } => [0x80, note, 0],
            NoteEvent::PitchBend { value } => {
                let (lsb, msb) = encode_bend(value);
                [0xE0, lsb, msb]
            }
        }
    }
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NoteEvent::NoteOn { note, velocity } => {
                write!(f, "Note On {} vel {}", note_name(note), velocity)
            }
            NoteEvent::NoteOff { note } => write!(f, "Note Off {}", note_name(note)),
            NoteEvent::PitchBend { value } => write!(f, "Pitch Bend {}", value),
        }
    }
}

/// Splits a clamped bend value into the two 7-bit data bytes of a
/// pitch-bend message.
pub fn encode_bend(value: i32) -> (u8, u8) {
    let clamped = value.clamp(BEND_MIN, BEND_MAX);
    let biased = (clamped + 8192) as u16;
    let lsb = (biased & 0x7f) as u8;
    let msb = ((biased >> 7) & 0x7f) as u8;
    (lsb, msb)
}

/// Inverse of [`encode_bend`].
#[cfg(test)]
pub fn decode_bend(lsb: u8, msb: u8) -> i32 {
    (((msb as i32) << 7) | lsb as i32) - 8192
}

/// Continuous MIDI-scale pitch value for a frequency (69.0 = A4 = 440 Hz).
pub fn frequency_to_midi(frequency: f32) -> f32 {
    69.0 + 12.0 * (frequency / 440.0).log2()
}

/// Display name for an integer note number, e.g. 61 -> "C#4".
pub fn note_name(note: u8) -> String {
    let name = NOTE_NAMES[(note % 12) as usize];
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", name, octave)
}

/// Maps frame RMS to a note-on velocity. The floor of 20 keeps events
/// audible; 127 is the protocol ceiling.
pub fn velocity_from_rms(rms: f32, sensitivity: f32) -> u8 {
    (rms * 127.0 * sensitivity).round().clamp(20.0, 127.0) as u8
}
