//! Layered error definitions
//!
//! Categorized by source: config / collaborator / backend

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Collaborator Errors =====
    /// Data collaborator failed to deliver or acknowledge records
    #[error("data client '{client}' error: {message}")]
    DataClient { client: String, message: String },

    /// Filter collaborator error
    #[error("filter client error: {message}")]
    FilterClient { message: String },

    /// Collaborator already stopped
    #[error("'{name}' is stopped")]
    Stopped { name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create data client error
    pub fn data_client(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataClient {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Create stopped error
    pub fn stopped(name: impl Into<String>) -> Self {
        Self::Stopped { name: name.into() }
    }
}
