//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Beacon Relay - forwards beacon sightings to configured sinks
#[derive(Parser, Debug)]
#[command(
    name = "beacon-relay",
    author,
    version,
    about = "Beacon sighting relay",
    long_about = "Normalizes proximity beacon sightings and relays them to configured sinks.\n\n\
                  Each sink gets its own delivery policy (send mode and resend interval), \n\
                  and every scan cycle is also fanned out to registered observers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BEACON_RELAY_VERBOSE")]
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
        env = "BEACON_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay against the mock scanner
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "relay.toml",
        env = "BEACON_RELAY_CONFIG"
    )]
    pub config: PathBuf,

    /// Number of scan cycles to process (0 = until interrupted)
    #[arg(long, default_value = "0", env = "BEACON_RELAY_CYCLES")]
    pub cycles: u64,

    /// Override scanner.scan_period_ms from configuration
    #[arg(long, env = "BEACON_RELAY_SCAN_PERIOD_MS")]
    pub scan_period_ms: Option<u64>,

    /// Beacons the mock scanner reports per cycle
    #[arg(long, default_value = "4", env = "BEACON_RELAY_BEACONS")]
    pub beacons: u16,

    /// Fraction of mock sightings with a broken identifier triplet
    #[arg(long, default_value = "0.0", value_parser = parse_rate)]
    pub malformed_rate: f64,

    /// Scan cycles buffered between scanner and pipeline
    #[arg(long, default_value = "16", env = "BEACON_RELAY_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BEACON_RELAY_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running the relay
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-sink policy and parameters
    #[arg(long)]
    pub sinks: bool,
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

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{rate} is not within 0.0..=1.0"))
    }
}
