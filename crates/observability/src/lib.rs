//! # Observability
//!
//! Tracing subscriber and Prometheus metrics for the exporter.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON / Pretty / Compact)
//! - Prometheus metrics endpoint
//! - Exporter metric helpers and cycle summaries
//!
//! ## Usage
//!
//! ```ignore
//! use observability::{init_with_config, metrics, ObservabilityConfig};
//!
//! init_with_config(ObservabilityConfig::default())?;
//!
//! metrics::record_points_written("telemetry", batch.point_count());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_cycle, record_export_failure, record_offsets_persisted, record_points_failed,
    record_points_written, record_records_skipped, record_worker_alive, record_write_fallback,
    record_write_latency_ms, CycleMetricsAggregator, MetricsSummary, RunningStats, StatsSummary,
};

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log output format
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Level used when `RUST_LOG` is unset
    pub default_log_level: String,
    /// Ignore `RUST_LOG` and use `default_log_level` (quiet mode)
    pub force_level: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
            force_level: false,
        }
    }
}

impl ObservabilityConfig {
    /// Configuration derived from CLI verbosity flags
    ///
    /// `quiet` wins over `verbose`; each `-v` raises the level one step.
    pub fn from_verbosity(verbose: u8, quiet: bool, log_format: LogFormat) -> Self {
        let (level, force_level) = if quiet {
            ("warn", true)
        } else {
            match verbose {
                0 => ("info", false),
                1 => ("debug", false),
                _ => ("trace", false),
            }
        };
        Self {
            log_format,
            metrics_port: None,
            default_log_level: level.to_string(),
            force_level,
        }
    }

    /// Enable the Prometheus endpoint (0 = disabled)
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = (port != 0).then_some(port);
        self
    }

    fn env_filter(&self) -> EnvFilter {
        if self.force_level {
            return EnvFilter::new(&self.default_log_level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Compact single line
    Compact,
}

/// Initialise with a custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus recorder (tracing set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
