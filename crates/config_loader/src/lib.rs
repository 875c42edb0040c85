//! # Config Loader
//!
//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Parse TOML/JSON exporter configuration files
//! - Validate configuration legality
//! - Validate export definitions into their typed form
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("exporter.toml")).unwrap();
//! println!("InfluxDB: {}", config.influxdb.url);
//! ```

mod exports;
mod parser;
mod validator;

pub use contracts::ExporterConfig;
pub use exports::{is_valid_export, load_export_definitions, validate_export};
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ExporterConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ExporterConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built configuration (e.g. after CLI overrides)
    pub fn validate(config: &ExporterConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize ExporterConfig to TOML string
    pub fn to_toml(config: &ExporterConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize ExporterConfig to JSON string
    pub fn to_json(config: &ExporterConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FatalWritePolicy;

    const MINIMAL_TOML: &str = r#"
[influxdb]
url = "http://localhost:8086"
username = "writer"
password = "secret"
retries = 2

[worker]
get_data_timeout = 2.5
get_data_limit = 1000
on_fatal_write = { policy = "retry", max_attempts = 3 }

[watchdog]
start_delay_secs = 1.0
monitor_delay_secs = 0.5

[source]
exports_path = "exports.json"
records_path = "records.jsonl"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.influxdb.url, "http://localhost:8086");
        assert_eq!(config.influxdb.retries, 2);
        assert_eq!(config.worker.get_data_limit, 1000);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.influxdb.url, config2.influxdb.url);
        assert_eq!(config.worker.on_fatal_write, config2.worker.on_fatal_write);
        assert_eq!(
            config2.worker.on_fatal_write,
            FatalWritePolicy::Retry {
                max_attempts: 3,
                backoff_ms: 1_000
            }
        );
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.source.records_path, config2.source.records_path);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.toml");
        std::fs::write(&path, MINIMAL_TOML).unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.watchdog.monitor_delay_secs, 0.5);

        let yaml = dir.path().join("exporter.yaml");
        std::fs::write(&yaml, MINIMAL_TOML).unwrap();
        let err = ConfigLoader::load_from_path(&yaml).unwrap_err().to_string();
        assert!(err.contains("unsupported config format"), "got: {err}");
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = MINIMAL_TOML.replace("get_data_limit = 1000", "get_data_limit = 0");
        let result = ConfigLoader::load_from_str(&content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("get_data_limit"));
    }

    #[test]
    fn test_unrepresentable_pull_timeout_rejected() {
        for value in ["1e300", "nan"] {
            let content =
                MINIMAL_TOML.replace("get_data_timeout = 2.5", &format!("get_data_timeout = {value}"));
            let err = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap_err();
            assert!(err.to_string().contains("worker.get_data_timeout"), "got: {err}");
        }
    }
}
