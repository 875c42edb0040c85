//! TimeSeriesBackend trait - Write pipeline output interface
//!
//! Backend failures are classified once, at the boundary, into a closed
//! `BackendErrorKind`; the write pipeline only ever matches on the kind.

use std::fmt;

use thiserror::Error;

use crate::{Point, TimePrecision};

/// Classification of a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Target database does not exist
    DatabaseNotFound,
    /// Batch rejected as malformed
    BadRequest,
    /// Batch too large for one call
    PayloadTooLarge,
    /// Credentials rejected
    Unauthorized,
    /// Backend unreachable or failing (transport error, 5xx)
    Unavailable,
    /// Backend connection was closed locally
    Closed,
    /// Anything else
    Other,
}

impl BackendErrorKind {
    /// Errors that a per-measurement split may get past
    pub fn is_batch_rejection(&self) -> bool {
        matches!(self, Self::BadRequest | Self::PayloadTooLarge)
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DatabaseNotFound => "database not found",
            Self::BadRequest => "bad request",
            Self::PayloadTooLarge => "payload too large",
            Self::Unauthorized => "unauthorized",
            Self::Unavailable => "unavailable",
            Self::Closed => "closed",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Classified backend error
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn database_not_found(db_name: &str) -> Self {
        Self::new(
            BackendErrorKind::DatabaseNotFound,
            format!("database not found: {db_name}"),
        )
    }

    pub fn closed(backend: &str) -> Self {
        Self::new(BackendErrorKind::Closed, format!("backend '{backend}' is closed"))
    }
}

/// Time-series database write interface
///
/// All backend implementations must implement this trait.
#[trait_variant::make(TimeSeriesBackend: Send)]
pub trait LocalTimeSeriesBackend {
    /// Backend name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write all points to `db_name` in a single call
    ///
    /// # Errors
    /// Returns a classified backend error
    async fn write_points(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<(), BackendError>;

    /// Create `db_name` (idempotent on the backend side)
    async fn create_database(&self, db_name: &str) -> Result<(), BackendError>;
}
