//! Exporter orchestrator - builds the collaborators and supervises a run
//!
//! The worker and the data client are watched by the watchdog; on
//! termination or when either dies, the hooks stop the worker, then the
//! data client, then close the backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clients::{JsonlDataClient, StaticFilterClient};
use contracts::{ExporterConfig, ShutdownHook, TimeSeriesBackend};
use tracing::{info, instrument, warn};
use worker::{ExportWorker, ShutdownReason, Watchdog};
use writer::{InfluxHttpBackend, LogBackend, WritePipeline};

use super::stats::RunStats;
use crate::error::CliError;

/// One exporter process
pub struct Exporter {
    config: ExporterConfig,
}

impl Exporter {
    pub fn new(config: ExporterConfig) -> Self {
        Self { config }
    }

    /// Run against InfluxDB, or a logging backend with `dry_run`
    pub async fn run(
        self,
        dry_run: bool,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<RunStats> {
        if dry_run {
            info!("dry run: points are logged, not written");
            self.run_with(Arc::new(LogBackend::new("dry_run")), shutdown)
                .await
        } else {
            let backend = InfluxHttpBackend::from_config(&self.config.influxdb)
                .context("Failed to create InfluxDB backend")?;
            self.run_with(Arc::new(backend), shutdown).await
        }
    }

    /// Run against `backend` until `shutdown` resolves or a component dies
    #[instrument(
        name = "exporter_run",
        skip_all,
        fields(backend = TimeSeriesBackend::name(backend.as_ref()))
    )]
    pub async fn run_with<B>(
        self,
        backend: Arc<B>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<RunStats>
    where
        B: TimeSeriesBackend + ShutdownHook + Send + Sync + 'static,
    {
        let started = Instant::now();
        let source = &self.config.source;

        let filter = Arc::new(
            StaticFilterClient::load(&source.exports_path).with_context(|| {
                format!(
                    "Failed to load export definitions from {}",
                    source.exports_path.display()
                )
            })?,
        );
        if filter.is_empty() {
            warn!("no valid export definitions, every record will be skipped");
        }

        let offsets_path = source.resolved_offsets_path();
        let data = Arc::new(
            JsonlDataClient::open(&source.records_path, &offsets_path).with_context(|| {
                format!("Failed to open records {}", source.records_path.display())
            })?,
        );

        let pipeline = WritePipeline::new(Arc::clone(&backend), self.config.worker.split_failure);
        let write_metrics = pipeline.metrics();
        let worker = ExportWorker::new(
            self.config.worker.clone(),
            filter.clone(),
            Arc::clone(&data),
            pipeline,
        );
        let handle = worker.handle();

        let watchdog = Watchdog::new(&self.config.watchdog)
            .probe(Arc::new(handle.clone()))
            .probe(data.clone())
            .hook(Arc::new(handle.clone()))
            .hook(data.clone())
            .hook(backend.clone());

        let token = watchdog.cancellation_token();
        let signal_task = tokio::spawn(async move {
            shutdown.await;
            info!("termination requested");
            token.cancel();
        });

        let worker_task = worker.spawn();
        let watchdog_task = watchdog.spawn();
        filter.complete_sync(false);

        let reason = watchdog_task.await.context("Watchdog task failed")?;
        signal_task.abort();
        let worker_result = worker_task.await.context("Worker task failed")?;

        let stats = RunStats {
            duration: started.elapsed(),
            worker: handle.stats(),
            writes: write_metrics.snapshot(),
            reason: reason.clone(),
        };

        match (worker_result, reason) {
            (Ok(()), ShutdownReason::ProbeFailed { probe }) if probe != handle.name() => {
                Err(CliError::Unhealthy { probe }.into())
            }
            (Ok(()), _) => Ok(stats),
            // hooks closed the backend under an in-flight cycle; its batch stays unacknowledged
            (Err(e), ShutdownReason::Cancelled) => {
                warn!(error = %e, "last batch interrupted by shutdown");
                Ok(stats)
            }
            (Err(e), ShutdownReason::ProbeFailed { .. }) => {
                Err(CliError::worker_failed(e.to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{InfluxDbConfig, SourceConfig, WatchdogConfig, WorkerConfig};
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use writer::{BackendErrorKind, MockBackend};

    const EXPORTS: &str = r#"[
        {"id": "cpu", "args": {"db_name": "metrics"}},
        {"id": "mem", "args": {"db_name": "metrics"}}
    ]"#;

    fn record(value: i64, exports: &str) -> String {
        format!(r#"{{"fields": {{"value": {value}}}, "extra": {{"host": "a"}}, "export_ids": [{exports}]}}"#)
    }

    fn config(dir: &Path, records: &[String]) -> ExporterConfig {
        let exports_path = dir.join("exports.json");
        let records_path = dir.join("records.jsonl");
        std::fs::write(&exports_path, EXPORTS).unwrap();
        let mut file = std::fs::File::create(&records_path).unwrap();
        for line in records {
            writeln!(file, "{line}").unwrap();
        }

        ExporterConfig {
            influxdb: InfluxDbConfig {
                url: "http://localhost:8086".into(),
                username: None,
                password: None,
                timeout_secs: 1,
                retries: 0,
            },
            worker: WorkerConfig {
                get_data_timeout: 0.02,
                ..WorkerConfig::default()
            },
            watchdog: WatchdogConfig {
                start_delay_secs: 0.0,
                monitor_delay_secs: 0.01,
            },
            source: SourceConfig {
                exports_path,
                records_path,
                offsets_path: None,
            },
        }
    }

    #[tokio::test]
    async fn test_run_writes_and_commits_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let config = config(
            dir.path(),
            &[record(1, r#""cpu""#), record(2, r#""cpu", "mem""#), record(3, r#""gone""#)],
        );
        let offsets = config.source.resolved_offsets_path();
        let backend = Arc::new(MockBackend::new().with_databases(["metrics"]));

        let stats = Exporter::new(config)
            .run_with(Arc::clone(&backend), tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(stats.reason, ShutdownReason::Cancelled);
        assert_eq!(backend.written_points(), 3);
        assert_eq!(stats.worker.records, 3);
        assert_eq!(stats.worker.export_failures, 1);
        assert_eq!(std::fs::read_to_string(offsets).unwrap().trim(), "3");
        assert!(backend.is_closed());
    }

    #[tokio::test]
    async fn test_fatal_write_fails_run_without_commit() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), &[record(1, r#""cpu""#)]);
        let offsets = config.source.resolved_offsets_path();
        let backend = Arc::new(
            MockBackend::new()
                .with_databases(["metrics"])
                .reject_measurement("cpu", BackendErrorKind::Unavailable),
        );

        let err = Exporter::new(config)
            .run_with(Arc::clone(&backend), std::future::pending())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Export worker failed"), "got: {err}");
        assert!(!offsets.exists());
        assert!(backend.is_closed());
    }

    #[tokio::test]
    async fn test_missing_exports_file() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path(), &[]);
        config.source.exports_path = dir.path().join("missing.json");

        let err = Exporter::new(config)
            .run_with(Arc::new(MockBackend::new()), std::future::pending())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("export definitions"), "got: {err}");
    }
}
