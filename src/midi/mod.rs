use midir::{MidiOutput, MidiOutputConnection};
use thiserror::Error;

use crate::note::events::NoteEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no MIDI output ports available")]
    NoPorts,
    #[error("no MIDI output port matching '{0}'")]
    PortNotFound(String),
    #[error("failed to open MIDI output: {0}")]
    Init(String),
    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

/// Where note events go. Picked once at startup: a real MIDI port when one
/// is selected, the log otherwise. Send failures must not take down the
/// pipeline; the caller logs and moves on.
pub trait EventSink {
    fn send(&mut self, event: &NoteEvent) -> Result<(), SinkError>;
}

/// Sends raw channel-1 messages to a midir output connection.
pub struct MidiPortSink {
    port_name: String,
    connection: MidiOutputConnection,
}

impl MidiPortSink {
    /// Opens the port selected by index or case-insensitive name substring.
    pub fn connect(selector: &str) -> Result<Self, SinkError> {
        let output = MidiOutput::new("pitchwire").map_err(|e| SinkError::Init(e.to_string()))?;
        let ports = output.ports();
        if ports.is_empty() {
            return Err(SinkError::NoPorts);
        }

        let port = if let Ok(index) = selector.parse::<usize>() {
            ports
                .get(index)
                .cloned()
                .ok_or_else(|| SinkError::PortNotFound(selector.to_string()))?
        } else {
            let needle = selector.to_lowercase();
            ports
                .iter()
                .find(|p| {
                    output
                        .port_name(p)
                        .map(|n| n.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
                .cloned()
                .ok_or_else(|| SinkError::PortNotFound(selector.to_string()))?
        };

        let port_name = output
            .port_name(&port)
            .unwrap_or_else(|_| "unknown".to_string());
        let connection = output
            .connect(&port, "pitchwire-out")
            .map_err(|e| SinkError::Init(e.to_string()))?;

        Ok(Self { port_name, connection })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl EventSink for MidiPortSink {
    fn send(&mut self, event: &NoteEvent) -> Result<(), SinkError> {
        self.connection
            .send(&event.to_bytes())
            .map_err(|e| SinkError::Send(e.to_string()))
    }
}

/// Fallback sink used when no MIDI device is attached: every event is
/// recorded in the log instead.
pub struct LogSink;

impl EventSink for LogSink {
    fn send(&mut self, event: &NoteEvent) -> Result<(), SinkError> {
        let bytes = event.to_bytes();
        log::info!("{} [{} {} {}]", event, bytes[0], bytes[1], bytes[2]);
        Ok(())
    }
}

/// Names of the available MIDI output ports, in selection-index order.
pub fn list_ports() -> Result<Vec<String>, SinkError> {
    let output = MidiOutput::new("pitchwire").map_err(|e| SinkError::Init(e.to_string()))?;
    Ok(output
        .ports()
        .iter()
        .map(|p| {
            output
                .port_name(p)
                .unwrap_or_else(|_| "unknown".to_string())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test double that records everything it is asked to send.
    pub struct RecordingSink(pub Vec<NoteEvent>);

    impl EventSink for RecordingSink {
        fn send(&mut self, event: &NoteEvent) -> Result<(), SinkError> {
            self.0.push(*event);
            Ok(())
        }
    }

    #[test]
    fn log_sink_never_fails() {
        let mut sink = LogSink;
        assert!(sink
            .send(&NoteEvent::NoteOn { note: 60, velocity: 100 })
            .is_ok());
        assert!(sink.send(&NoteEvent::PitchBend { value: -8192 }).is_ok());
    }

    #[test]
    fn sinks_are_object_safe() {
        let mut recorder: Box<dyn EventSink> = Box::new(RecordingSink(Vec::new()));
        recorder
            .send(&NoteEvent::NoteOff { note: 60 })
            .unwrap();
    }
}
