//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Influx Exporter - export filtered records into InfluxDB
#[derive(Parser, Debug)]
#[command(
    name = "influx-exporter",
    author,
    version,
    about = "Export filtered records into InfluxDB",
    long_about = "Consumes already-filtered records, turns them into typed and tagged \n\
                  points per export definition, writes them to InfluxDB and only then \n\
                  acknowledges the consumed records."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "INFLUX_EXPORTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "INFLUX_EXPORTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the exporter until terminated or failed
    Run(RunArgs),

    /// Validate the configuration and export definitions without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "INFLUX_EXPORTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the InfluxDB URL from configuration
    #[arg(long, env = "INFLUX_EXPORTER_INFLUXDB_URL")]
    pub influxdb_url: Option<String>,

    /// Override the export definitions file from configuration
    #[arg(long, env = "INFLUX_EXPORTER_EXPORTS")]
    pub exports: Option<PathBuf>,

    /// Override the records file from configuration
    #[arg(long, env = "INFLUX_EXPORTER_RECORDS")]
    pub records: Option<PathBuf>,

    /// Log points instead of writing them to InfluxDB
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "INFLUX_EXPORTER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "INFLUX_EXPORTER_CONFIG")]
    pub config: PathBuf,

    /// Export definitions file (default: `source.exports_path` of the configuration)
    #[arg(long)]
    pub exports: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
