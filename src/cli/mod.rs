//! CLI interface for Chamber

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resonant oscillator chamber
#[derive(Parser)]
#[command(name = "chamber")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play the configured voices through the audio device
    Play {
        /// Configuration file path
        #[arg(short, long, default_value = "chamber.yaml")]
        config: PathBuf,

        /// Stop after this many seconds (plays until Ctrl+C otherwise)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Render to a WAV file
    Render {
        /// Configuration file path
        #[arg(short, long, default_value = "chamber.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },

    /// Print the resonance factor between two frequencies
    Resonance {
        /// First frequency in Hz
        a: f64,

        /// Second frequency in Hz
        b: f64,

        /// Take search tuning from this configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List available audio output devices
    Devices,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "chamber.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}
