//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pulse Syncer - pulse-id message synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "pulse-syncer",
    author,
    version,
    about = "Pulse-id message synchronizer",
    long_about = "Groups per-channel values into one bundle per pulse id.\n\n\
                  Validates synchronizer configurations, shows which channels \n\
                  are expected at each pulse, and replays synthetic traffic \n\
                  through the synchronizer to report its behaviour."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PULSE_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PULSE_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay synthetic channel traffic through the synchronizer
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configured schedules
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "PULSE_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Number of pulses to generate
    #[arg(long, default_value = "1000", env = "PULSE_SYNCER_PULSES")]
    pub pulses: u64,

    /// First pulse id
    #[arg(long, default_value = "0")]
    pub start_pulse: i64,

    /// Probability of dropping each expected value (0.0 - 1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_probability)]
    pub drop_rate: f64,

    /// Reorder values within each producer in windows of this many pulses
    #[arg(long, default_value = "0")]
    pub shuffle: usize,

    /// Seed for dropping and reordering (random if omitted)
    #[arg(long, env = "PULSE_SYNCER_SEED")]
    pub seed: Option<u64>,

    /// Delay between values from one producer, in microseconds
    #[arg(long, default_value = "0")]
    pub interval_us: u64,

    /// Replay timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "PULSE_SYNCER_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PULSE_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without replaying
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// First pulse of the expected-channel table
    #[arg(long)]
    pub from: Option<i64>,

    /// Number of pulses in the expected-channel table
    #[arg(long, default_value = "10")]
    pub count: u64,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0..=1.0"))
    }
}
