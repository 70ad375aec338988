mod audio;
mod cli;
mod config;
mod midi;
mod note;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use midi::EventSink;
use note::events::NoteEvent;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = cli::Cli::parse();

    if cli.list_midi_ports {
        let ports = midi::list_ports().context("listing MIDI output ports")?;
        if ports.is_empty() {
            println!("No MIDI output ports available");
        }
        for (i, name) in ports.iter().enumerate() {
            println!("[{}] {}", i, name);
        }
        return Ok(());
    }

    // Load config: explicit --config path, or auto-detected pitchwire.toml
    let config_path = cli.config.clone().or_else(config::discover_config_path);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cli.merge_config(&cfg);
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let config = cli.to_config();
    let mut pipeline = pipeline::Pipeline::new(&config).context("invalid configuration")?;

    let mut sink: Box<dyn EventSink> = match cli.midi_port.as_deref() {
        Some(selector) => {
            let port = midi::MidiPortSink::connect(selector).context("opening MIDI output")?;
            log::info!("MIDI output: {}", port.port_name());
            Box::new(port)
        }
        None => {
            log::info!("No MIDI port selected; events will be logged");
            Box::new(midi::LogSink)
        }
    };

    let mut capture =
        audio::capture::InputCapture::open(cli.input_device.as_deref(), config.detector.frame_size)
            .context("opening audio input")?;
    log::info!(
        "Capturing at {} Hz, frame size {} ({:.0} ms window)",
        capture.sample_rate(),
        config.detector.frame_size,
        config.detector.frame_size as f32 / capture.sample_rate() as f32 * 1000.0
    );

    let stop = stdin_stop_signal();
    let interval = Duration::from_millis(config.analysis.analysis_interval_ms);
    let end = cli.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    log::info!(
        "Analyzing every {} ms; press Enter to stop",
        interval.as_millis()
    );

    let mut next_tick = Instant::now();
    loop {
        if stop.try_recv().is_ok() {
            break;
        }
        if end.is_some_and(|end| Instant::now() >= end) {
            break;
        }

        if let Some(frame) = capture.next_frame() {
            for event in pipeline.tick(&frame, Instant::now()) {
                deliver(sink.as_mut(), &event);
            }
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            // Fell behind; realign instead of bursting to catch up.
            next_tick = now;
        }
    }

    // Mandatory cleanup: the device must be left with all notes released.
    if let Some(sounding) = pipeline.current_note() {
        log::info!("Releasing {}", note::events::note_name(sounding));
    }
    for event in pipeline.finish() {
        deliver(sink.as_mut(), &event);
    }
    log::info!("Stopped");
    Ok(())
}

/// Sink failures are non-fatal: the event is recorded in the log and the
/// pipeline state keeps moving.
fn deliver(sink: &mut dyn EventSink, event: &NoteEvent) {
    if let Err(err) = sink.send(event) {
        log::warn!("dropped event ({}): {}", err, event);
    }
}

fn stdin_stop_signal() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}
