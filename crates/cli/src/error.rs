//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration or export definitions rejected by `validate`
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Export worker stopped on a fatal error
    #[error("Export worker failed: {message}")]
    WorkerFailed { message: String },

    /// A liveness probe other than the worker failed
    #[error("Component '{probe}' stopped unexpectedly")]
    Unhealthy { probe: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn worker_failed(message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            message: message.into(),
        }
    }
}
