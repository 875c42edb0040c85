//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::Exporter;

/// Execute the `run` command
pub async fn run_exporter(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref url) = args.influxdb_url {
        info!(url = %url, "Overriding InfluxDB URL from CLI");
        config.influxdb.url = url.clone();
    }
    if let Some(ref exports) = args.exports {
        info!(path = %exports.display(), "Overriding export definitions from CLI");
        config.source.exports_path = exports.clone();
    }
    if let Some(ref records) = args.records {
        info!(path = %records.display(), "Overriding records file from CLI");
        config.source.records_path = records.clone();
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration after overrides")?;

    info!(
        influxdb = %config.influxdb.url,
        records = %config.source.records_path.display(),
        exports = %config.source.exports_path.display(),
        limit = config.worker.get_data_limit,
        on_fatal_write = ?config.worker.on_fatal_write,
        split_failure = ?config.worker.split_failure,
        "Configuration loaded"
    );

    let stats = Exporter::new(config)
        .run(args.dry_run, shutdown_signal())
        .await
        .context("Exporter failed")?;

    info!(
        records = stats.worker.records,
        points_written = stats.writes.points_written,
        duration_secs = stats.duration.as_secs_f64(),
        reason = %stats.reason,
        "Exporter finished"
    );
    stats.print_summary();
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
