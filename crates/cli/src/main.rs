//! # Influx Exporter CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - Export worker and watchdog wiring
//! - Graceful shutdown on SIGINT / SIGTERM

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_exporter, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let metrics_port = match &cli.command {
        Commands::Run(args) => args.metrics_port,
        Commands::Validate(_) => 0,
    };
    observability::init_with_config(
        ObservabilityConfig::from_verbosity(cli.verbose, cli.quiet, cli.log_format.into())
            .with_metrics_port(metrics_port),
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Influx exporter starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_exporter(args).await,
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
