//! Chamber - resonant oscillator chamber

use anyhow::{Context, Result};
use clap::Parser;
use chamber::config::{self, ChamberConfig};
use chamber::engine::{self, AudioBackend, CpalBackend, Engine, WavBackend};
use chamber::resonance::{ResonanceEngine, ResonanceParams};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Play {
            config: config_path,
            duration,
        } => {
            println!("Loading configuration from {:?}...", config_path);
            let cfg = config::load_config(&config_path)?;

            let backend = CpalBackend::new(cfg.audio.device.as_deref())?;
            let mut engine = Engine::new(&cfg, backend);

            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
            })
            .context("failed to install Ctrl+C handler")?;

            println!("Playing {} voices, {} resonators", cfg.voices.len(), cfg.resonators.len());
            println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
            println!("  Block size: {} samples", cfg.audio.block_size);
            println!("  Tick rate: {} Hz", cfg.tick_rate);
            println!("Press Ctrl+C to stop.");

            engine.start()?;
            let result = frame_loop(&mut engine, cfg.tick_rate, duration, &running);
            engine.finish();
            result?;

            println!("\nStopped after {} ticks", engine.ticks());
        }

        Commands::Render {
            config: config_path,
            output,
            duration,
        } => {
            println!("Loading configuration from {:?}...", config_path);
            let cfg = config::load_config(&config_path)?;

            println!("Rendering {} seconds to {:?}...", duration, output);

            let backend = WavBackend::new(&output, cfg.audio.sample_rate, cfg.audio.channels)?;
            let mut engine = Engine::new(&cfg, backend);
            let ticks = render_ticks(&cfg, duration);

            engine.start()?;
            for tick in 0..ticks {
                if let Err(e) = engine.process() {
                    engine.finish();
                    return Err(e.into());
                }

                if tick % 16 == 0 {
                    print!("\r  Progress: {:.1}s / {}s", engine.backend().duration_secs(), duration);
                    std::io::stdout().flush()?;
                }
            }
            engine.finish();

            let recorder = engine.into_backend();
            let seconds = recorder.duration_secs();
            recorder.finalize()?;
            println!("\nRendered {:.1}s to {:?}", seconds, output);
        }

        Commands::Resonance { a, b, config } => {
            let params = match config {
                Some(path) => ResonanceParams::from(&config::load_config(&path)?.resonance),
                None => ResonanceParams::default(),
            };
            let mut resonance = ResonanceEngine::new(params);
            let factor = resonance.factor(a, b);
            println!("{} Hz : {} Hz", a, b);
            println!("  Ratio: {:.6}", ResonanceEngine::ratio(a, b));
            println!("  Resonance factor: {:.6}", factor);
        }

        Commands::Devices => {
            println!("Available audio devices:\n");

            if let Some(name) = engine::default_device_name() {
                println!("Default output: {}\n", name);
            }

            println!("Output devices:");
            let devices = engine::list_output_devices();
            if devices.is_empty() {
                println!("  (none found)");
            }
            for (name, config) in devices {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    print_summary(&cfg);
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../chamber.example.yaml");

            let path = "chamber.yaml";
            if std::path::Path::new(path).exists() {
                println!("chamber.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created chamber.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

/// Tick the engine at `tick_rate` until stopped or `duration` runs out
fn frame_loop<B: AudioBackend>(
    engine: &mut Engine<B>,
    tick_rate: u32,
    duration: Option<u64>,
    running: &AtomicBool,
) -> Result<()> {
    let frame = Duration::from_secs_f64(1.0 / tick_rate as f64);
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let started = Instant::now();
        engine.process()?;
        if let Some(rest) = frame.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    Ok(())
}

/// Ticks needed to cover `duration` seconds of output
fn render_ticks(cfg: &ChamberConfig, duration: u64) -> u64 {
    let frames = cfg.audio.sample_rate as u64 * duration;
    frames.div_ceil(cfg.audio.block_size as u64)
}

fn print_summary(cfg: &ChamberConfig) {
    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
    println!("  Block size: {}", cfg.audio.block_size);
    println!("  Channels: {}", cfg.audio.channels);
    println!("  Tick rate: {} Hz", cfg.tick_rate);
    println!("  Voices: {}", cfg.voices.len());
    for voice in &cfg.voices {
        println!(
            "    - {} ({}) {:.2} Hz x {:.0} {}",
            voice.name,
            voice.shape.name(),
            voice.frequency,
            voice.amplitude,
            if voice.active { "[active]" } else { "[muted]" }
        );
    }
    println!("  Resonators: {}", cfg.resonators.len());
    for resonator in &cfg.resonators {
        println!(
            "    - {} ({}) {:.2} Hz, gain {:.2}",
            resonator.name,
            resonator.shape.name(),
            resonator.frequency,
            resonator.gain
        );
    }
}
