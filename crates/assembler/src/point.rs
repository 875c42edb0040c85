//! Point Builder
//!
//! Pure transformation of one (export id, fields, extra) triple into a
//! `Point`. No I/O, no shared state.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use contracts::{ExportArgs, ExportId, Point, TimeSpec};
use serde_json::{Map, Value};

use crate::casts::cast_entries;
use crate::error::{BuildError, Result};

/// Build the point of `export_id` for one record
///
/// # Errors
/// - Missing or unparsable timestamp
/// - Failed type cast (fields or tags)
/// - Empty fields
pub fn build_point(
    export_id: &ExportId,
    fields: &Map<String, Value>,
    extra: &Map<String, Value>,
    args: &ExportArgs,
) -> Result<Point> {
    let casts = args.type_casts.as_ref();

    let fields = cast_entries(fields, casts)?;
    if fields.is_empty() {
        return Err(BuildError::EmptyFields {
            export_id: export_id.to_string(),
        });
    }

    let time = args
        .time
        .as_ref()
        .map(|spec| extract_time(spec, extra))
        .transpose()?;

    let tags = match &args.time {
        Some(spec) if extra.len() > 1 => {
            cast_entries(extra.iter().filter(|(k, _)| **k != spec.key), casts)?
        }
        None if !extra.is_empty() => cast_entries(extra, casts)?,
        _ => Map::new(),
    };

    Ok(Point {
        measurement: export_id.clone(),
        fields,
        tags: (!tags.is_empty()).then_some(tags),
        time,
    })
}

/// Read (and optionally re-format) the event time from `extra`
fn extract_time(spec: &TimeSpec, extra: &Map<String, Value>) -> Result<Value> {
    let raw = extra
        .get(&spec.key)
        .ok_or_else(|| BuildError::MissingTimeKey {
            key: spec.key.clone(),
        })?;

    let Some(format) = spec.format.as_deref() else {
        return Ok(raw.clone());
    };

    let value = raw.as_str().ok_or_else(|| BuildError::NonStringTime {
        key: spec.key.clone(),
        format: format.to_string(),
    })?;

    convert_timestamp(value, format, spec.utc).map(Value::String)
}

/// Parse `value` with `format` and emit ISO-8601
///
/// Output is `YYYY-MM-DDTHH:MM:SS`, followed by `.ffffff` when the
/// sub-second part is non-zero and by `Z` when `utc` is set. Patterns
/// without time components resolve to midnight.
pub fn convert_timestamp(value: &str, format: &str, utc: bool) -> Result<String> {
    let parsed = match NaiveDateTime::parse_from_str(value, format) {
        Ok(dt) => dt,
        Err(err) => NaiveDate::parse_from_str(value, format)
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(|_| BuildError::InvalidTime {
                value: value.to_string(),
                format: format.to_string(),
                message: err.to_string(),
            })?,
    };

    let mut iso = parsed.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = parsed.nanosecond() / 1_000;
    if micros != 0 {
        iso.push_str(&format!(".{micros:06}"));
    }
    if utc {
        iso.push('Z');
    }
    Ok(iso)
}
