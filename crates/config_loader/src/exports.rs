//! Export definition validation
//!
//! Rules:
//! - `db_name` present and non-empty
//! - `time_key`, if present, is non-empty and declared as `"<time_key>:extra"`
//!   in the definition's mappings
//! - `time_precision`, if present, is one of `s`, `m`, `ms`, `u`
//! - every `type_casts` value is a known cast specifier
//! - `time_format`, if present, is a well-formed strftime pattern

use std::path::Path;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use contracts::{
    CastMap, CastSpec, ContractError, ExportArgs, ExportDefinition, ExportId, RawExportDefinition,
    TimePrecision, TimeSpec,
};

use crate::parser;

/// Validate a raw definition into its typed form
///
/// # Errors
/// Returns the first violated rule as `ContractError::ConfigValidation`,
/// with the field path prefixed by the export id.
pub fn validate_export(raw: &RawExportDefinition) -> Result<ExportDefinition, ContractError> {
    let field = |name: &str| format!("exports[{}].{name}", raw.id);
    let args = &raw.args;

    if raw.id.is_empty() {
        return Err(ContractError::config_validation(
            "exports[].id",
            "export id cannot be empty",
        ));
    }

    let db_name = match args.db_name.as_deref() {
        Some(db) if !db.is_empty() => db.to_string(),
        Some(_) => {
            return Err(ContractError::config_validation(
                field("args.db_name"),
                "db_name cannot be empty",
            ))
        }
        None => {
            return Err(ContractError::config_validation(
                field("args.db_name"),
                "db_name is required",
            ))
        }
    };

    let time = match args.time_key.as_deref() {
        Some("") => {
            return Err(ContractError::config_validation(
                field("args.time_key"),
                "time_key cannot be empty",
            ))
        }
        Some(key) => {
            let mapping = format!("{key}:extra");
            if !raw.mappings.contains_key(&mapping) {
                return Err(ContractError::config_validation(
                    field("mappings"),
                    format!("time_key '{key}' requires a '{mapping}' mapping"),
                ));
            }
            if let Some(format) = args.time_format.as_deref() {
                validate_time_format(format).map_err(|message| {
                    ContractError::config_validation(field("args.time_format"), message)
                })?;
            }
            Some(TimeSpec {
                key: key.to_string(),
                format: args.time_format.clone(),
                utc: args.utc.unwrap_or(true),
            })
        }
        None => None,
    };

    let time_precision = args
        .time_precision
        .as_deref()
        .map(str::parse::<TimePrecision>)
        .transpose()
        .map_err(|message| ContractError::config_validation(field("args.time_precision"), message))?;

    let type_casts = args
        .type_casts
        .as_ref()
        .map(|casts| {
            casts
                .iter()
                .map(|(name, spec)| {
                    spec.parse::<CastSpec>()
                        .map(|cast| (name.clone(), cast))
                        .map_err(|message| {
                            ContractError::config_validation(
                                field(&format!("args.type_casts.{name}")),
                                message,
                            )
                        })
                })
                .collect::<Result<CastMap, _>>()
        })
        .transpose()?;

    Ok(ExportDefinition {
        id: ExportId::from(raw.id.as_str()),
        args: Arc::new(ExportArgs {
            db_name,
            time,
            time_precision,
            type_casts,
        }),
    })
}

/// Boolean form of [`validate_export`]
pub fn is_valid_export(raw: &RawExportDefinition) -> bool {
    validate_export(raw).is_ok()
}

/// Load a JSON array of raw export definitions
///
/// Only the file structure is checked here; each definition is validated
/// separately so one bad definition does not hide the others.
pub fn load_export_definitions(path: &Path) -> Result<Vec<RawExportDefinition>, ContractError> {
    let content = std::fs::read_to_string(path)?;
    parser::parse_json(&content)
}

fn validate_time_format(format: &str) -> Result<(), String> {
    if format.is_empty() {
        return Err("time_format cannot be empty".to_string());
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("malformed time_format '{format}'"));
    }
    Ok(())
}
