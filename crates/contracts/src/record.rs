//! MatchedRecord - Data collaborator output

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::ExportId;

/// One filtered input record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchedRecord {
    /// Measured data (becomes point fields)
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Candidate tag / timestamp data
    #[serde(default)]
    pub extra: Map<String, Value>,

    /// Export definitions this record matched
    #[serde(default)]
    pub export_ids: BTreeSet<ExportId>,

    /// Set when the upstream filter failed on this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MatchedRecord {
    /// Record matching `export_ids` with the given fields and extra data
    pub fn new<I, S>(fields: Map<String, Value>, extra: Map<String, Value>, export_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ExportId>,
    {
        Self {
            fields,
            extra,
            export_ids: export_ids.into_iter().map(Into::into).collect(),
            error: None,
        }
    }

    /// Record that failed upstream
    pub fn failed<I, S>(error: impl Into<String>, export_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ExportId>,
    {
        Self {
            export_ids: export_ids.into_iter().map(Into::into).collect(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Result of one bounded pull
#[derive(Debug, Clone, Default)]
pub struct PulledBatch {
    /// Records delivered by this pull
    pub records: Vec<MatchedRecord>,

    /// Per-message errors reported by the data collaborator
    pub errors: Vec<String>,
}

impl PulledBatch {
    pub fn from_records(records: Vec<MatchedRecord>) -> Self {
        Self {
            records,
            errors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_deserialize() {
        let record: MatchedRecord = serde_json::from_value(json!({
            "fields": {"temp": "21.5"},
            "extra": {"loc": "room1"},
            "export_ids": ["e2", "e1", "e1"]
        }))
        .unwrap();

        assert_eq!(record.fields["temp"], json!("21.5"));
        assert_eq!(record.export_ids.len(), 2);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_failed_record() {
        let record = MatchedRecord::failed("bad payload", ["e1"]);
        assert_eq!(record.error.as_deref(), Some("bad payload"));
        assert!(record.fields.is_empty());
    }
}
