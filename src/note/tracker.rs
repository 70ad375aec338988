use std::time::{Duration, Instant};

use crate::audio::smoother::SmoothedPitch;
use crate::config::TrackerConfig;
use crate::note::events::{frequency_to_midi, velocity_from_rms, NoteEvent, BEND_MAX, BEND_MIN};

/// Converts the smoothed pitch stream into note-on/off/bend events.
///
/// Invariant: `current_note` is `Some` exactly while a note-on has been
/// emitted without a matching note-off.
pub struct NoteTracker {
    config: TrackerConfig,
    current_note: Option<u8>,
    last_stable_note: Option<u8>,
    stable_count: u32,
    last_note_on: Option<Instant>,
    last_note_off: Option<Instant>,
}

impl NoteTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            current_note: None,
            last_stable_note: None,
            stable_count: 0,
            last_note_on: None,
            last_note_off: None,
        }
    }

    pub fn current_note(&self) -> Option<u8> {
        self.current_note
    }

    /// One pipeline pass. `rms` is the raw frame amplitude used for
    /// velocity; `now` comes from the caller's monotonic clock, so ticks
    /// may be unevenly spaced.
    pub fn tick(
        &mut self,
        pitch: SmoothedPitch,
        rms: f32,
        onset: bool,
        now: Instant,
        events: &mut Vec<NoteEvent>,
    ) {
        if pitch.frequency <= 0.0 || pitch.clarity < self.config.clarity_threshold {
            self.handle_silence(now, events);
            return;
        }

        let midi_value = frequency_to_midi(pitch.frequency);
        let rounded = midi_value.round();
        if !(0.0..=127.0).contains(&rounded) {
            self.handle_silence(now, events);
            return;
        }
        let note = rounded as u8;
        let cents_diff = (midi_value - rounded).abs() * 100.0;

        if onset && self.current_note != Some(note) {
            // Attacks bypass the hysteresis ramp-up.
            self.last_stable_note = Some(note);
            self.stable_count = self.config.stability_frames;
        } else if self.last_stable_note == Some(note) {
            self.stable_count = self.stable_count.saturating_add(1);
        } else if cents_diff <= self.config.note_hysteresis_cents {
            self.last_stable_note = Some(note);
            self.stable_count = 1;
        } else {
            self.stable_count = 0;
        }

        if self.stable_count >= self.config.stability_frames {
            self.try_note_on(note, rms, onset, now, events);
        }

        if let Some(sounding) = self.current_note {
            if self.config.pitch_bend_enabled {
                let deviation = midi_value - sounding as f32;
                let value = (deviation / self.config.bend_range_semitones * 8192.0).round();
                events.push(NoteEvent::PitchBend {
                    value: (value as i32).clamp(BEND_MIN, BEND_MAX),
                });
            }
        }
    }

    /// Closes any sounding note and resets to the initial state. Called on
    /// pipeline stop so the output device is left with all notes released.
    pub fn release(&mut self, events: &mut Vec<NoteEvent>) {
        if let Some(note) = self.current_note {
            events.push(NoteEvent::NoteOff { note });
            events.push(NoteEvent::PitchBend { value: 0 });
        }
        self.current_note = None;
        self.last_stable_note = None;
        self.stable_count = 0;
        self.last_note_on = None;
        self.last_note_off = None;
    }

    fn handle_silence(&mut self, now: Instant, events: &mut Vec<NoteEvent>) {
        let Some(note) = self.current_note else { return };
        // Debounce: a momentary dropout shorter than the minimum duration
        // keeps the note sounding.
        let held_long_enough = self
            .last_note_on
            .is_some_and(|t| now.duration_since(t) > self.min_duration());
        if held_long_enough {
            events.push(NoteEvent::NoteOff { note });
            if self.config.pitch_bend_enabled {
                events.push(NoteEvent::PitchBend { value: 0 });
            }
            self.current_note = None;
            self.last_stable_note = None;
            self.stable_count = 0;
            self.last_note_off = Some(now);
        }
    }

    fn try_note_on(
        &mut self,
        note: u8,
        rms: f32,
        onset: bool,
        now: Instant,
        events: &mut Vec<NoteEvent>,
    ) {
        let changed = self.current_note != Some(note);
        let retriggered = !changed && onset && self.retrigger_gap_elapsed(now);
        if !changed && !retriggered {
            return;
        }

        if let Some(old) = self.current_note {
            let sounding_for = self
                .last_note_on
                .map_or(Duration::MAX, |t| now.duration_since(t));
            if !onset && sounding_for < self.min_duration() {
                // Short blip: drop the switch, the old note keeps sounding.
                return;
            }
            events.push(NoteEvent::NoteOff { note: old });
            self.last_note_off = Some(now);
        }

        let velocity = velocity_from_rms(rms, self.config.velocity_sensitivity);
        events.push(NoteEvent::NoteOn { note, velocity });
        self.current_note = Some(note);
        self.last_note_on = Some(now);
    }

    /// Retriggering the pitch that is already sounding requires a gap since
    /// both the last note-on and the last note-off, guarding against rapid
    /// false retriggers.
    fn retrigger_gap_elapsed(&self, now: Instant) -> bool {
        let gap = Duration::from_millis((self.config.min_duration_ms / 2).max(40));
        let since_on = self
            .last_note_on
            .map_or(true, |t| now.duration_since(t) > gap);
        let since_off = self
            .last_note_off
            .map_or(true, |t| now.duration_since(t) > gap);
        since_on && since_off
    }

    fn min_duration(&self) -> Duration {
        Duration::from_millis(self.config.min_duration_ms)
    }
}
