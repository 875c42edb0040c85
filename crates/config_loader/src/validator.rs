//! Exporter configuration validation
//!
//! Rules:
//! - field-level bounds declared with `validator` derives on `ExporterConfig`
//! - durations in seconds are finite
//! - retry policy makes at least one extra attempt
//! - source paths are non-empty and distinct

use contracts::{ContractError, ExporterConfig, FatalWritePolicy};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate an `ExporterConfig`
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ExporterConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_durations(config)?;
    validate_fatal_write_policy(config)?;
    validate_sources(config)?;
    Ok(())
}

/// Run the derived field-level checks
fn validate_fields(config: &ExporterConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, String::new())
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Dotted path and message of the first failing field
fn first_error(errors: &ValidationErrors, prefix: String) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries.into_iter().find_map(|(field, kind)| {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("failed '{}' check", e.code));
                (path, message)
            }),
            ValidationErrorsKind::Struct(inner) => first_error(inner, path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_error(inner, format!("{path}[{idx}]"))),
        }
    })
}

/// NaN slips through the range checks
fn validate_durations(config: &ExporterConfig) -> Result<(), ContractError> {
    let durations = [
        ("worker.get_data_timeout", config.worker.get_data_timeout),
        ("watchdog.start_delay_secs", config.watchdog.start_delay_secs),
        ("watchdog.monitor_delay_secs", config.watchdog.monitor_delay_secs),
    ];
    for (field, secs) in durations {
        if !secs.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("{secs} is not a valid number of seconds"),
            ));
        }
    }
    Ok(())
}

/// Retry policy must actually retry
fn validate_fatal_write_policy(config: &ExporterConfig) -> Result<(), ContractError> {
    if let FatalWritePolicy::Retry { max_attempts, .. } = config.worker.on_fatal_write {
        if max_attempts == 0 {
            return Err(ContractError::config_validation(
                "worker.on_fatal_write.max_attempts",
                "max_attempts must be >= 1 for the retry policy",
            ));
        }
    }
    Ok(())
}

/// Source file locations
fn validate_sources(config: &ExporterConfig) -> Result<(), ContractError> {
    let source = &config.source;

    if source.exports_path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "source.exports_path",
            "exports_path cannot be empty",
        ));
    }
    if source.records_path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "source.records_path",
            "records_path cannot be empty",
        ));
    }
    if source.resolved_offsets_path() == source.records_path {
        return Err(ContractError::config_validation(
            "source.offsets_path",
            "offsets_path must differ from records_path",
        ));
    }
    Ok(())
}
