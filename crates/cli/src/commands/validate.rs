//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{load_export_definitions, validate_export, ConfigLoader};
use contracts::{ExporterConfig, FatalWritePolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exports: Option<ExportsReport>,
}

#[derive(Serialize)]
struct ConfigSummary {
    influxdb_url: String,
    records_path: String,
    offsets_path: String,
    get_data_limit: usize,
    on_fatal_write: String,
    split_failure: String,
}

#[derive(Serialize)]
struct ExportsReport {
    path: String,
    total: usize,
    valid: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    invalid: Vec<InvalidExport>,
}

#[derive(Serialize)]
struct InvalidExport {
    id: String,
    error: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        let message = result
            .error
            .unwrap_or_else(|| "invalid export definitions".to_string());
        Err(CliError::validation(message).into())
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let mut result = ValidationResult {
        valid: false,
        config_path: args.config.display().to_string(),
        error: None,
        warnings: Vec::new(),
        summary: None,
        exports: None,
    };

    if !args.config.exists() {
        result.error = Some(CliError::config_not_found(&result.config_path).to_string());
        return result;
    }

    let config = match ConfigLoader::load_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    };

    let exports_path = args
        .exports
        .clone()
        .unwrap_or_else(|| config.source.exports_path.clone());
    match check_exports(&exports_path) {
        Ok(report) => {
            if report.valid == 0 {
                result
                    .warnings
                    .push("No valid export definitions - every record will be skipped".to_string());
            }
            result.valid = report.invalid.is_empty();
            result.exports = Some(report);
        }
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    }

    result.warnings.extend(collect_warnings(&config));
    result.summary = Some(summarize(&config));
    result
}

fn check_exports(path: &Path) -> Result<ExportsReport, contracts::ContractError> {
    let raw = load_export_definitions(path)?;
    let invalid: Vec<InvalidExport> = raw
        .iter()
        .filter_map(|definition| {
            validate_export(definition).err().map(|e| InvalidExport {
                id: definition.id.clone(),
                error: e.to_string(),
            })
        })
        .collect();

    Ok(ExportsReport {
        path: path.display().to_string(),
        total: raw.len(),
        valid: raw.len() - invalid.len(),
        invalid,
    })
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ExporterConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.influxdb.retries == 0 {
        warnings.push("influxdb.retries is 0 - any transport error fails the write".to_string());
    }
    if !config.source.records_path.exists() {
        warnings.push(format!(
            "Records file {} does not exist yet",
            config.source.records_path.display()
        ));
    }
    if let FatalWritePolicy::Retry { max_attempts: 0, .. } = config.worker.on_fatal_write {
        warnings.push("worker.on_fatal_write retries 0 times - same as stop".to_string());
    }

    warnings
}

fn summarize(config: &ExporterConfig) -> ConfigSummary {
    ConfigSummary {
        influxdb_url: config.influxdb.url.clone(),
        records_path: config.source.records_path.display().to_string(),
        offsets_path: config.source.resolved_offsets_path().display().to_string(),
        get_data_limit: config.worker.get_data_limit,
        on_fatal_write: format!("{:?}", config.worker.on_fatal_write),
        split_failure: format!("{:?}", config.worker.split_failure),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }

    if let Some(ref summary) = result.summary {
        println!("\n  InfluxDB: {}", summary.influxdb_url);
        println!("  Records: {}", summary.records_path);
        println!("  Offsets: {}", summary.offsets_path);
        println!("  Batch limit: {}", summary.get_data_limit);
        println!("  On fatal write: {}", summary.on_fatal_write);
        println!("  Split failure: {}", summary.split_failure);
    }

    if let Some(ref exports) = result.exports {
        println!(
            "\n  Exports: {} valid of {} ({})",
            exports.valid, exports.total, exports.path
        );
        for invalid in &exports.invalid {
            println!("  ✗ {}: {}", invalid.id, invalid.error);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }
}
