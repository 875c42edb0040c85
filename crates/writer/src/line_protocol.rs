//! InfluxDB line protocol encoding
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp
//! ```
//!
//! Tags are written sorted by key. `null` fields and tags are skipped.
//! Nested values are written as compact JSON strings. The timestamp is
//! rendered at the write precision (nanoseconds when none is given).

use chrono::{DateTime, NaiveDateTime, Utc};
use contracts::{Point, TimePrecision};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Point that cannot be expressed in line protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Every field was null
    #[error("point '{measurement}' has no non-null fields")]
    NoFields { measurement: String },

    /// Time value cannot be converted to an epoch timestamp
    #[error("point '{measurement}' has an invalid time {value}")]
    InvalidTime { measurement: String, value: String },
}

/// Encode a group of points, one line each
pub fn encode_points(
    points: &[Point],
    precision: Option<TimePrecision>,
) -> Result<String, EncodeError> {
    let mut body = String::new();
    for point in points {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&encode_point(point, precision)?);
    }
    Ok(body)
}

/// Encode a single point
pub fn encode_point(point: &Point, precision: Option<TimePrecision>) -> Result<String, EncodeError> {
    let mut line = escape_measurement(&point.measurement);

    if let Some(tags) = &point.tags {
        let mut sorted: Vec<_> = tags
            .iter()
            .filter_map(|(k, v)| tag_value(v).map(|v| (k, v)))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in sorted {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(&value));
        }
    }

    let fields = encode_fields(&point.fields);
    if fields.is_empty() {
        return Err(EncodeError::NoFields {
            measurement: point.measurement.to_string(),
        });
    }
    line.push(' ');
    line.push_str(&fields);

    if let Some(time) = &point.time {
        let timestamp = timestamp(time, precision).ok_or_else(|| EncodeError::InvalidTime {
            measurement: point.measurement.to_string(),
            value: time.to_string(),
        })?;
        line.push(' ');
        line.push_str(&timestamp.to_string());
    }

    Ok(line)
}

fn encode_fields(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .filter_map(|(key, value)| {
            field_value(value).map(|v| format!("{}={}", escape_key(key), v))
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Field value in line protocol syntax (`None` for null)
fn field_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(number(n)),
        Value::String(s) => Some(quote(s)),
        nested => Some(quote(&nested.to_string())),
    }
}

fn number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        format!("{i}i")
    } else if let Some(f) = n.as_f64() {
        // u64 beyond i64 range lands here as well
        format!("{f}")
    } else {
        n.to_string()
    }
}

fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        other => Some(other.to_string()),
    }
}

/// Epoch timestamp of `time` at `precision`
fn timestamp(time: &Value, precision: Option<TimePrecision>) -> Option<i64> {
    match time {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let parsed = DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
                })
                .ok()?;
            match precision {
                Some(TimePrecision::Seconds) => Some(parsed.timestamp()),
                Some(TimePrecision::Minutes) => Some(parsed.timestamp().div_euclid(60)),
                Some(TimePrecision::Milliseconds) => Some(parsed.timestamp_millis()),
                Some(TimePrecision::Microseconds) => Some(parsed.timestamp_micros()),
                None => parsed.timestamp_nanos_opt(),
            }
        }
        _ => None,
    }
}

/// Measurement names escape backslashes, newlines, commas and spaces
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys additionally escape equals signs
fn escape_key(s: &str) -> String {
    escape_measurement(s).replace('=', "\\=")
}

fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}
