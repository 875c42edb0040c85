//! Collaborator traits - filter client, data client, lifecycle capabilities
//!
//! The exporter core never talks to a broker or a filter engine directly. It
//! sees these interfaces only; the process wiring decides what backs them.

use std::sync::Arc;
use std::time::Duration;

use crate::{ContractError, ExportArgs, PulledBatch};

/// Filter synchronisation callback type
///
/// Invoked by the filter collaborator once its initial state is loaded. The
/// argument is the error flag: `false` on success, `true` when loading failed.
pub type SyncCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Filter collaborator
///
/// Owns the export definitions; the core only looks them up.
pub trait FilterClient: Send + Sync {
    /// Look up the validated arguments of an export
    ///
    /// Returns `None` when the definition is unknown or was removed.
    fn export_args(&self, export_id: &str) -> Option<Arc<ExportArgs>>;

    /// Register the synchronisation callback
    ///
    /// If synchronisation already happened, the callback is invoked right away.
    fn on_sync(&self, callback: SyncCallback);
}

/// Data collaborator
///
/// Delivers batches of matched records and owns the acknowledgment cursor.
#[trait_variant::make(DataClient: Send)]
pub trait LocalDataClient {
    /// Client name (used for logging)
    fn name(&self) -> &str;

    /// Pull up to `limit` records, waiting at most `timeout`
    ///
    /// Per-message failures are reported in `PulledBatch::errors`; an `Err`
    /// means the pull itself could not be performed.
    async fn pull_batch(&self, timeout: Duration, limit: usize)
        -> Result<PulledBatch, ContractError>;

    /// Persist the cursor past every record pulled so far
    async fn persist_offsets(&self) -> Result<(), ContractError>;
}

/// Liveness probe polled by the watchdog
pub trait LivenessProbe: Send + Sync {
    /// Probe name (used for logging)
    fn name(&self) -> &str;

    /// Non-blocking liveness check
    fn is_alive(&self) -> bool;
}

/// Step of the coordinated shutdown sequence
pub trait ShutdownHook: Send + Sync {
    /// Hook name (used for logging)
    fn name(&self) -> &str;

    /// Stop / close the component
    ///
    /// Must be idempotent; errors are logged by the caller and do not abort
    /// the remaining hooks.
    fn shutdown(&self) -> Result<(), ContractError>;
}
