//! Write pipeline error types

use std::collections::BTreeMap;
use std::fmt;

use contracts::{points_per_measurement, BackendError, BackendErrorKind, ExportId, Point};
use thiserror::Error;

/// Point counts keyed by measurement, rendered as `{a: 2, b: 1}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementCounts(pub BTreeMap<ExportId, usize>);

impl MeasurementCounts {
    pub fn of(points: &[Point]) -> Self {
        Self(points_per_measurement(points))
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

impl fmt::Display for MeasurementCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (measurement, count)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{measurement}: {count}")?;
        }
        f.write_str("}")
    }
}

/// Fatal write error
///
/// Carries the destination database, per-measurement point counts and the
/// backend failure that made the write unrecoverable.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The group could not be written as a whole
    #[error(
        "writing points failed: reason=[{source}] database='{db_name}' points_per_measurement={counts}"
    )]
    Batch {
        db_name: String,
        counts: MeasurementCounts,
        #[source]
        source: BackendError,
    },

    /// Some measurements were still rejected after splitting the group
    #[error(
        "writing points failed after split: reason=[{source}] database='{db_name}' failed_points_per_measurement={counts}"
    )]
    Split {
        db_name: String,
        counts: MeasurementCounts,
        /// First rejection
        #[source]
        source: BackendError,
    },
}

impl WriteError {
    pub fn batch(db_name: &str, points: &[Point], source: BackendError) -> Self {
        Self::Batch {
            db_name: db_name.to_string(),
            counts: MeasurementCounts::of(points),
            source,
        }
    }

    /// Destination database
    pub fn db_name(&self) -> &str {
        match self {
            Self::Batch { db_name, .. } | Self::Split { db_name, .. } => db_name,
        }
    }

    /// Points that were not written
    pub fn counts(&self) -> &MeasurementCounts {
        match self {
            Self::Batch { counts, .. } | Self::Split { counts, .. } => counts,
        }
    }

    /// Classification of the underlying backend failure
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            Self::Batch { source, .. } | Self::Split { source, .. } => source.kind,
        }
    }
}
