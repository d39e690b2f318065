use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod status;
pub use status::StatusDisplay;

/// Music and sound effect playback from the command line
#[derive(Debug, Parser)]
#[command(name = "cadence")]
#[command(about = "Stream music tracks and fire sound effects")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Output device name (overrides the configured one)
    #[arg(long, global = true)]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stream a music track, printing progress
    Music {
        /// Audio file to play
        file: PathBuf,
        /// Extra replays after the first pass, -1 to loop until Ctrl-C
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        loops: i32,
        /// Master gain in decibels
        #[arg(long, allow_hyphen_values = true)]
        volume: Option<f32>,
    },
    /// Decode a clip into memory and play it
    Effect {
        /// Audio file to load
        file: PathBuf,
        /// Times the clip is repeated within each play
        #[arg(long, default_value_t = 1)]
        times: u32,
        /// Number of simultaneous plays
        #[arg(long, default_value_t = 1)]
        overlap: u32,
    },
    /// List available audio output devices
    Devices,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &std::path::Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => path.to_path_buf(),
            },
            Err(_) => path.to_path_buf(),
        }
    }
}
