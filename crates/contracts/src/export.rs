//! Export definitions - Filter collaborator output
//!
//! The filter collaborator hands out raw, loosely-typed definitions. They are
//! validated once (see `config_loader::validate_export`) into `ExportArgs`, the
//! only form the point builder ever sees.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::ExportId;

/// Export definition as published by the filter collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExportDefinition {
    /// Stable export id (becomes the measurement name)
    pub id: String,

    /// Destination arguments
    #[serde(default)]
    pub args: RawExportArgs,

    /// Declared field mapping (`"<name>:data"` / `"<name>:extra"` -> source path)
    #[serde(default)]
    pub mappings: HashMap<String, String>,
}

/// Unvalidated destination arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExportArgs {
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub time_key: Option<String>,
    #[serde(default)]
    pub time_format: Option<String>,
    #[serde(default)]
    pub time_precision: Option<String>,
    #[serde(default)]
    pub utc: Option<bool>,
    #[serde(default)]
    pub type_casts: Option<HashMap<String, String>>,
}

/// Validated export definition
#[derive(Debug, Clone)]
pub struct ExportDefinition {
    pub id: ExportId,
    pub args: Arc<ExportArgs>,
}

/// Validated destination arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArgs {
    /// Target database (non-empty)
    pub db_name: String,

    /// Timestamp extraction, if the export carries its own event time
    pub time: Option<TimeSpec>,

    /// Write precision (None = backend default)
    pub time_precision: Option<TimePrecision>,

    /// Per-field type casts
    pub type_casts: Option<CastMap>,
}

impl ExportArgs {
    /// Arguments writing to `db_name` with no time handling and no casts
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            time: None,
            time_precision: None,
            type_casts: None,
        }
    }
}

/// Where the event time of a record comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSpec {
    /// `extra` entry holding the timestamp
    pub key: String,
    /// strftime-style parse pattern (None = use raw value)
    pub format: Option<String>,
    /// Append a `Z` suffix to re-emitted timestamps
    pub utc: bool,
}

/// Write precision accepted by the time-series backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimePrecision {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "u")]
    Microseconds,
}

impl TimePrecision {
    /// All accepted precisions
    pub const ALL: [TimePrecision; 4] = [
        TimePrecision::Seconds,
        TimePrecision::Minutes,
        TimePrecision::Milliseconds,
        TimePrecision::Microseconds,
    ];

    /// Wire spelling (`s`, `m`, `ms`, `u`)
    pub fn as_str(&self) -> &'static str {
        match self {
            TimePrecision::Seconds => "s",
            TimePrecision::Minutes => "m",
            TimePrecision::Milliseconds => "ms",
            TimePrecision::Microseconds => "u",
        }
    }
}

impl FromStr for TimePrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown time precision '{s}'"))
    }
}

impl fmt::Display for TimePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of type cast specifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CastSpec {
    /// `:integer`
    Integer,
    /// `:number`
    Number,
    /// `:string`
    String,
    /// `:boolean`
    Boolean,
    /// `string:boolean`
    StringToBoolean,
    /// `object:string`
    ObjectToString,
    /// `array:string`
    ArrayToString,
}

impl CastSpec {
    pub const ALL: [CastSpec; 7] = [
        CastSpec::Integer,
        CastSpec::Number,
        CastSpec::String,
        CastSpec::Boolean,
        CastSpec::StringToBoolean,
        CastSpec::ObjectToString,
        CastSpec::ArrayToString,
    ];

    /// Specifier as written in export definitions
    pub fn as_str(&self) -> &'static str {
        match self {
            CastSpec::Integer => ":integer",
            CastSpec::Number => ":number",
            CastSpec::String => ":string",
            CastSpec::Boolean => ":boolean",
            CastSpec::StringToBoolean => "string:boolean",
            CastSpec::ObjectToString => "object:string",
            CastSpec::ArrayToString => "array:string",
        }
    }
}

impl FromStr for CastSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown type cast '{s}'"))
    }
}

impl TryFrom<String> for CastSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CastSpec> for String {
    fn from(spec: CastSpec) -> Self {
        spec.as_str().to_string()
    }
}

impl fmt::Display for CastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable field name -> cast specifier table of one export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastMap(HashMap<String, CastSpec>);

impl CastMap {
    /// Cast configured for `key`
    #[inline]
    pub fn get(&self, key: &str) -> Option<CastSpec> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, CastSpec)> for CastMap {
    fn from_iter<T: IntoIterator<Item = (String, CastSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, CastSpec); N]> for CastMap {
    fn from(entries: [(&str, CastSpec); N]) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}
