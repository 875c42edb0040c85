//! Point / PointsBatch - Batch assembler output

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{ExportId, TimePrecision};

/// One write unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Measurement name (= export id)
    pub measurement: ExportId,

    /// Post-cast field values (never empty)
    pub fields: Map<String, Value>,

    /// Post-cast tags (only present when non-empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,

    /// ISO-8601 string or raw passthrough value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Value>,
}

/// Points of one write call
#[derive(Debug, Clone, Copy)]
pub struct PointGroup<'a> {
    pub db_name: &'a str,
    pub time_precision: Option<TimePrecision>,
    pub points: &'a [Point],
}

/// Points grouped by database and time precision for one write cycle
#[derive(Debug, Clone, Default)]
pub struct PointsBatch {
    groups: BTreeMap<String, BTreeMap<Option<TimePrecision>, Vec<Point>>>,
}

impl PointsBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point to its (database, precision) group, creating the group if absent
    pub fn push(&mut self, db_name: &str, time_precision: Option<TimePrecision>, point: Point) {
        if let Some(by_precision) = self.groups.get_mut(db_name) {
            by_precision.entry(time_precision).or_default().push(point);
        } else {
            self.groups
                .entry(db_name.to_string())
                .or_default()
                .insert(time_precision, vec![point]);
        }
    }

    /// Points of a single group
    pub fn get(&self, db_name: &str, time_precision: Option<TimePrecision>) -> Option<&[Point]> {
        self.groups
            .get(db_name)
            .and_then(|by_precision| by_precision.get(&time_precision))
            .map(Vec::as_slice)
    }

    /// Iterate over groups (one write call each)
    pub fn groups(&self) -> impl Iterator<Item = PointGroup<'_>> {
        self.groups.iter().flat_map(|(db_name, by_precision)| {
            by_precision
                .iter()
                .map(move |(time_precision, points)| PointGroup {
                    db_name,
                    time_precision: *time_precision,
                    points,
                })
        })
    }

    /// Number of groups
    pub fn group_count(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Total number of points
    pub fn point_count(&self) -> usize {
        self.groups
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}

/// Count points per measurement (diagnostic context for write failures)
pub fn points_per_measurement(points: &[Point]) -> BTreeMap<ExportId, usize> {
    let mut counts = BTreeMap::new();
    for point in points {
        *counts.entry(point.measurement.clone()).or_insert(0) += 1;
    }
    counts
}
