//! Export Worker
//!
//! `WaitingForSync -> Running -> Stopped`. The worker blocks on the filter
//! synchronisation signal, then repeats one cycle at a time:
//!
//! ```text
//! pull_batch -> assemble -> write_batch -> persist_offsets
//! ```
//!
//! Offsets are persisted only after every group of the cycle was written.
//! The stop flag is checked between cycles, so the in-flight cycle always
//! completes. `Stopped` is terminal.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assembler::assemble;
use contracts::{
    ContractError, DataClient, FatalWritePolicy, FilterClient, LivenessProbe, PointsBatch,
    ShutdownHook, SyncCallback, TimeSeriesBackend, WorkerConfig,
};
use observability::CycleMetricsAggregator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use writer::{WritePipeline, WriteSummary};

use crate::error::WorkerError;
use crate::stats::{WorkerStats, WorkerStatsSnapshot};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    WaitingForSync = 0,
    Running = 1,
    Stopped = 2,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::WaitingForSync => "waiting_for_sync",
            WorkerState::Running => "running",
            WorkerState::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::WaitingForSync,
            1 => WorkerState::Running,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Shared {
    name: String,
    state: AtomicU8,
    /// `None` until synchronised, then the error flag
    sync: watch::Sender<Option<bool>>,
    stop: CancellationToken,
    stats: WorkerStats,
}

/// Cloneable control handle of an `ExportWorker`
///
/// Every method is non-blocking and safe to call from any thread.
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
}

impl WorkerHandle {
    fn new(name: impl Into<String>) -> Self {
        let (sync, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                state: AtomicU8::new(WorkerState::WaitingForSync as u8),
                sync,
                stop: CancellationToken::new(),
                stats: WorkerStats::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Deliver the filter synchronisation result
    ///
    /// Only the first call counts; later calls are ignored.
    pub fn set_filter_sync(&self, error: bool) {
        let first = self.shared.sync.send_if_modified(|sync| {
            if sync.is_some() {
                return false;
            }
            *sync = Some(error);
            true
        });
        if first {
            info!(worker = %self.shared.name, error, "filter synchronisation received");
        } else {
            debug!(worker = %self.shared.name, error, "ignoring repeated filter synchronisation");
        }
    }

    /// Callback forwarding to `set_filter_sync`, for `FilterClient::on_sync`
    pub fn sync_callback(&self) -> SyncCallback {
        let handle = self.clone();
        Arc::new(move |error| handle.set_filter_sync(error))
    }

    /// Request a stop after the in-flight cycle
    pub fn stop(&self) {
        if !self.shared.stop.is_cancelled() {
            info!(worker = %self.shared.name, state = %self.state(), "stop requested");
        }
        self.shared.stop.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop.is_cancelled()
    }

    /// `false` once the worker has stopped, forever
    pub fn is_alive(&self) -> bool {
        self.state() != WorkerState::Stopped
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    fn mark_running(&self) -> bool {
        self.shared
            .state
            .compare_exchange(
                WorkerState::WaitingForSync as u8,
                WorkerState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn mark_stopped(&self) {
        self.shared
            .state
            .store(WorkerState::Stopped as u8, Ordering::SeqCst);
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

impl LivenessProbe for WorkerHandle {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn is_alive(&self) -> bool {
        self.state() != WorkerState::Stopped
    }
}

impl ShutdownHook for WorkerHandle {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn shutdown(&self) -> Result<(), ContractError> {
        self.stop();
        Ok(())
    }
}

/// Marks the worker stopped when `run` returns or is dropped
struct StoppedOnExit(WorkerHandle);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        self.0.mark_stopped();
        observability::record_worker_alive(false);
    }
}

/// Export loop over a data collaborator and a backend
pub struct ExportWorker<D, B> {
    handle: WorkerHandle,
    filter: Arc<dyn FilterClient>,
    data: Arc<D>,
    pipeline: WritePipeline<B>,
    config: WorkerConfig,
    aggregator: CycleMetricsAggregator,
}

impl<D, B> ExportWorker<D, B>
where
    D: DataClient + Send + Sync + 'static,
    B: TimeSeriesBackend + Send + Sync + 'static,
{
    /// Create a worker and register it for the filter synchronisation signal
    pub fn new(
        config: WorkerConfig,
        filter: Arc<dyn FilterClient>,
        data: Arc<D>,
        pipeline: WritePipeline<B>,
    ) -> Self {
        let handle = WorkerHandle::new("export_worker");
        filter.on_sync(handle.sync_callback());
        Self {
            handle,
            filter,
            data,
            pipeline,
            config,
            aggregator: CycleMetricsAggregator::new(),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Run the worker on the tokio runtime
    pub fn spawn(self) -> JoinHandle<Result<(), WorkerError>> {
        tokio::spawn(self.run())
    }

    /// Run until stopped or failed
    ///
    /// Returns `Ok` after a requested stop and the error that stopped the
    /// worker otherwise. Either way the worker ends in `Stopped`.
    #[instrument(name = "export_worker_run", skip(self), fields(worker = %self.handle.name()))]
    pub async fn run(mut self) -> Result<(), WorkerError> {
        let _stopped = StoppedOnExit(self.handle.clone());

        let result = self.run_until_stopped().await;
        match &result {
            Ok(()) => info!("export worker stopped"),
            Err(err) => error!(error = %err, "export worker failed"),
        }
        if self.aggregator.total_cycles > 0 {
            info!("{}", self.aggregator.summary());
        }
        result
    }

    async fn run_until_stopped(&mut self) -> Result<(), WorkerError> {
        info!("waiting for filter synchronisation");
        match self.wait_for_sync().await {
            None => {
                info!("stop requested before filter synchronisation");
                return Ok(());
            }
            Some(true) => return Err(WorkerError::FilterSync),
            Some(false) => {}
        }

        if self.handle.mark_running() {
            observability::record_worker_alive(true);
        }
        info!(
            timeout_secs = self.config.get_data_timeout,
            limit = self.config.get_data_limit,
            "starting export consumption"
        );

        while !self.handle.is_stop_requested() {
            self.cycle().await?;
        }
        Ok(())
    }

    /// Sync error flag, or `None` when stopped first
    async fn wait_for_sync(&self) -> Option<bool> {
        let mut sync = self.handle.shared.sync.subscribe();
        tokio::select! {
            biased;
            _ = self.handle.shared.stop.cancelled() => None,
            synced = sync.wait_for(Option::is_some) => synced.ok().and_then(|s| *s),
        }
    }

    async fn cycle(&mut self) -> Result<(), WorkerError> {
        let started = Instant::now();
        let pulled = self
            .data
            .pull_batch(self.config.pull_timeout(), self.config.get_data_limit)
            .await
            .map_err(WorkerError::Pull)?;

        if !pulled.errors.is_empty() {
            return Err(WorkerError::Messages {
                errors: pulled.errors,
            });
        }
        if pulled.records.is_empty() {
            return Ok(());
        }

        let (batch, report) = assemble(&pulled.records, self.filter.as_ref());
        let summary = if batch.is_empty() {
            WriteSummary::default()
        } else {
            self.write(&batch).await?
        };

        self.data
            .persist_offsets()
            .await
            .map_err(WorkerError::PersistOffsets)?;
        observability::record_offsets_persisted();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let stats = &self.handle.shared.stats;
        stats.record_cycle(report.records, report.flagged_records, report.failed_exports);
        stats.add_points_written(summary.points_written);
        stats.inc_commits();
        self.aggregator
            .update(report.records, summary.points_written, report.skipped(), elapsed_ms);
        observability::record_cycle(report.records, summary.points_written, elapsed_ms);

        debug!(
            records = report.records,
            points = summary.points_written,
            discarded = summary.points_discarded,
            skipped = report.skipped(),
            elapsed_ms,
            "cycle committed"
        );
        Ok(())
    }

    /// Write `batch`, applying the fatal write policy
    async fn write(&self, batch: &PointsBatch) -> Result<WriteSummary, WorkerError> {
        let mut attempt: u32 = 0;
        loop {
            let err = match self.pipeline.write_batch(batch).await {
                Ok(summary) => return Ok(summary),
                Err(err) => err,
            };

            let FatalWritePolicy::Retry {
                max_attempts,
                backoff_ms,
            } = self.config.on_fatal_write
            else {
                return Err(err.into());
            };
            if attempt >= max_attempts {
                error!(attempts = attempt + 1, "batch write retries exhausted");
                return Err(err.into());
            }

            attempt += 1;
            let delay = Duration::from_millis(backoff_ms.saturating_mul(u64::from(attempt)));
            warn!(
                error = %err,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "batch write failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.handle.shared.stop.cancelled() => {
                    warn!("stop requested during write retry, batch not acknowledged");
                    return Err(err.into());
                }
            }
        }
    }
}
