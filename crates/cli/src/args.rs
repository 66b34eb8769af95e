//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// One-line usage printed when the arguments cannot be parsed.
pub const USAGE: &str = "Usage: vibrate <duration_ms>";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "vibrate")]
#[command(about = "Turn the vibrator on for a number of milliseconds, then off again")]
#[command(version)]
pub struct Args {
    /// Vibration duration in milliseconds
    #[arg(value_name = "DURATION_MS", allow_negative_numbers = true)]
    pub duration: String,

    /// Path to the TOML configuration file
    #[arg(long, value_name = "PATH", env = "VIBRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Log debug events
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the session report as JSON on stdout
    #[arg(long)]
    pub report: bool,
}
