//! Point building errors
//!
//! Every variant is a per-record failure: the record (or one of its export
//! ids) is reported and skipped, the cycle continues.

use contracts::CastSpec;
use thiserror::Error;

/// Point building error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Record was flagged as failed upstream
    #[error("record flagged as failed: {message}")]
    Flagged { message: String },

    /// Export definition vanished or was never known
    #[error("export definition '{export_id}' not found")]
    UnknownExport { export_id: String },

    /// Time key absent from the record's extra data
    #[error("time key '{key}' missing from extra")]
    MissingTimeKey { key: String },

    /// Formatted time value is not a string
    #[error("time value of '{key}' must be a string to apply format '{format}'")]
    NonStringTime { key: String, format: String },

    /// Timestamp does not match its format
    #[error("cannot parse time '{value}' with format '{format}': {message}")]
    InvalidTime {
        value: String,
        format: String,
        message: String,
    },

    /// Type cast failed
    #[error("cannot cast '{key}' with '{spec}': {message}")]
    Cast {
        key: String,
        spec: CastSpec,
        message: String,
    },

    /// Point would carry no fields
    #[error("point for '{export_id}' has no fields")]
    EmptyFields { export_id: String },
}

/// Assembler Result type alias
pub type Result<T> = std::result::Result<T, BuildError>;
