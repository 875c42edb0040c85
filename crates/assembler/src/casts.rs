//! Type Cast Registry
//!
//! Converts JSON values according to the closed `CastSpec` set. The registry
//! itself is the per-export `CastMap`; this module only holds the conversions.

use contracts::{CastMap, CastSpec};
use serde_json::{Map, Number, Value};

use crate::error::{BuildError, Result};

/// Convert `value` according to `spec`
///
/// `null` is returned unchanged for every specifier.
///
/// # Errors
/// A human-readable reason when the conversion is not possible
pub fn cast(spec: CastSpec, value: &Value) -> std::result::Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match spec {
        CastSpec::Integer => to_integer(value),
        CastSpec::Number => to_number(value),
        CastSpec::String => Ok(Value::String(to_display_string(value))),
        CastSpec::Boolean => Ok(Value::Bool(truthy(value))),
        CastSpec::StringToBoolean => string_to_boolean(value),
        CastSpec::ObjectToString | CastSpec::ArrayToString => serde_json::to_string(value)
            .map(Value::String)
            .map_err(|e| e.to_string()),
    }
}

/// Apply the cast registered for `key`, if any
pub fn cast_value(key: &str, value: &Value, casts: Option<&CastMap>) -> Result<Value> {
    match casts.and_then(|c| c.get(key)) {
        Some(spec) => cast(spec, value).map_err(|message| BuildError::Cast {
            key: key.to_string(),
            spec,
            message,
        }),
        None => Ok(value.clone()),
    }
}

/// Apply the cast map to every entry of `map`
pub fn cast_entries<'a, I>(entries: I, casts: Option<&CastMap>) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    entries
        .into_iter()
        .map(|(key, value)| Ok((key.clone(), cast_value(key, value, casts)?)))
        .collect()
}

fn to_integer(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::from(i));
            }
            if n.is_u64() {
                return Err(format!("{n} is out of integer range"));
            }
            let f = n
                .as_f64()
                .ok_or_else(|| format!("{n} is not representable"))?;
            float_to_integer(f)
        }
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("'{s}' is not an integer: {e}")),
        other => Err(format!("cannot convert {} to integer", kind(other))),
    }
}

fn float_to_integer(f: f64) -> std::result::Result<Value, String> {
    let truncated = f.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(format!("{f} is out of integer range"));
    }
    Ok(Value::from(truncated as i64))
}

fn to_number(value: &Value) -> std::result::Result<Value, String> {
    let f = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{n} is not representable"))?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{s}' is not a number: {e}"))?,
        other => return Err(format!("cannot convert {} to number", kind(other))),
    };
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} is not a finite number"))
}

fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn string_to_boolean(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::String(s) => match s.as_str() {
            "True" | "true" | "1" => Ok(Value::Bool(true)),
            "False" | "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("'{s}' is not a boolean literal")),
        },
        other => Err(format!("expected string, got {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
