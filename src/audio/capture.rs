use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use thiserror::Error;

use crate::audio::AudioFrame;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device available")]
    NoDevice,
    #[error("no audio input device matching '{0}'")]
    DeviceNotFound(String),
    #[error("audio device init failed: {0}")]
    DeviceInit(String),
    #[error("audio stream creation failed: {0}")]
    StreamCreate(String),
    #[error("audio capture failed to start: {0}")]
    Start(String),
}

/// Rolling window over the most recent samples. Split out from the device
/// handling so the windowing logic stays testable without audio hardware.
struct FrameAssembler {
    window: Vec<f32>,
    filled: usize,
}

impl FrameAssembler {
    fn new(frame_size: usize) -> Self {
        Self { window: vec![0.0; frame_size], filled: 0 }
    }

    fn append(&mut self, incoming: &[f32]) {
        let size = self.window.len();
        if incoming.len() >= size {
            self.window.copy_from_slice(&incoming[incoming.len() - size..]);
            self.filled = size;
            return;
        }
        if self.filled < size {
            let take = incoming.len().min(size - self.filled);
            self.window[self.filled..self.filled + take].copy_from_slice(&incoming[..take]);
            self.filled += take;
            if take == incoming.len() {
                return;
            }
            return self.append(&incoming[take..]);
        }
        let shift = incoming.len();
        self.window.copy_within(shift.., 0);
        self.window[size - shift..].copy_from_slice(incoming);
    }

    fn frame(&self) -> Option<&[f32]> {
        (self.filled == self.window.len()).then_some(&self.window[..])
    }
}

/// Microphone frame source: a cpal input stream downmixes to mono into an
/// SPSC ring buffer; the pipeline side drains it into a fixed-size rolling
/// window once per tick.
pub struct InputCapture {
    _stream: Stream,
    consumer: HeapCons<f32>,
    assembler: FrameAssembler,
    sample_rate: u32,
}

impl InputCapture {
    pub fn open(device_name: Option<&str>, frame_size: usize) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::DeviceInit(e.to_string()))?
                .find(|d| d.name().map(|n| n.contains(name)).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceInit(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: StreamConfig = supported.into();

        // Half a second of slack between the callback and the analysis tick.
        let rb = HeapRb::<f32>::new(sample_rate as usize / 2);
        let (mut producer, consumer) = rb.split();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels.max(1)) {
                        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                        // Drop samples when analysis lags; fresh audio
                        // matters more than complete audio here.
                        let _ = producer.try_push(mono);
                    }
                },
                |err| log::error!("audio input stream error: {}", err),
                None,
            )
            .map_err(|e| CaptureError::StreamCreate(e.to_string()))?;
        stream.play().map_err(|e| CaptureError::Start(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            consumer,
            assembler: FrameAssembler::new(frame_size),
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Drains captured samples and returns a copy of the latest full
    /// window, or `None` until enough audio has arrived.
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        let mut incoming = Vec::new();
        while let Some(sample) = self.consumer.try_pop() {
            incoming.push(sample);
        }
        if !incoming.is_empty() {
            self.assembler.append(&incoming);
        }
        self.assembler.frame().map(|samples| AudioFrame {
            samples: samples.to_vec(),
            sample_rate: self.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32).collect()
    }

    #[test]
    fn no_frame_until_window_fills() {
        let mut asm = FrameAssembler::new(8);
        asm.append(&ramp(0, 5));
        assert!(asm.frame().is_none());
        asm.append(&ramp(5, 3));
        assert_eq!(asm.frame().unwrap(), ramp(0, 8).as_slice());
    }

    #[test]
    fn window_slides_over_newer_samples() {
        let mut asm = FrameAssembler::new(8);
        asm.append(&ramp(0, 8));
        asm.append(&ramp(8, 3));
        assert_eq!(asm.frame().unwrap(), ramp(3, 8).as_slice());
    }

    #[test]
    fn oversized_chunk_keeps_only_the_tail() {
        let mut asm = FrameAssembler::new(4);
        asm.append(&ramp(0, 100));
        assert_eq!(asm.frame().unwrap(), ramp(96, 4).as_slice());
    }

    #[test]
    fn partial_fill_then_overflow() {
        let mut asm = FrameAssembler::new(4);
        asm.append(&ramp(0, 3));
        assert!(asm.frame().is_none());
        asm.append(&ramp(3, 3));
        assert_eq!(asm.frame().unwrap(), ramp(2, 4).as_slice());
    }
}
