//! Worker error types

use contracts::ContractError;
use thiserror::Error;
use writer::WriteError;

/// Reasons the export worker stopped on its own
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Filter collaborator reported a failed synchronisation
    #[error("filter synchronisation failed")]
    FilterSync,

    /// Pull could not be performed
    #[error("pulling records failed: {0}")]
    Pull(#[source] ContractError),

    /// Data collaborator reported per-message errors
    #[error("data client reported {} message error(s): {}", .errors.len(), .errors.join("; "))]
    Messages { errors: Vec<String> },

    /// Batch could not be written
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Offsets could not be persisted after a successful write
    #[error("persisting offsets failed: {0}")]
    PersistOffsets(#[source] ContractError),
}
