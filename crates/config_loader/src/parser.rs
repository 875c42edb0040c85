//! Configuration parsing
//!
//! TOML (preferred) and JSON are both accepted.

use contracts::ContractError;
use serde::de::DeserializeOwned;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML content
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON content
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse content in the given format
pub fn parse<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}
