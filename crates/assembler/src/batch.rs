//! Batch Assembler
//!
//! Turns one pulled batch of matched records into a `PointsBatch` grouped by
//! (database, time precision). Failures are isolated per record and per
//! export id; the output batch is always produced, possibly empty.

use contracts::{FilterClient, MatchedRecord, PointsBatch};
use tracing::{debug, error, warn};

use crate::error::BuildError;
use crate::point::build_point;

/// Outcome counters of one assembly pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Records seen
    pub records: usize,
    /// Records flagged as failed upstream
    pub flagged_records: usize,
    /// (record, export id) pairs that produced no point
    pub failed_exports: usize,
    /// Points pushed into the batch
    pub points: usize,
}

impl AssemblyReport {
    /// Records that contributed no point at all
    pub fn skipped(&self) -> usize {
        self.flagged_records + self.failed_exports
    }
}

/// Build the points batch of `records`
///
/// Each export id of a record is resolved through `filter` at call time, so
/// definitions removed since the record was matched are reported and skipped.
pub fn assemble<F>(records: &[MatchedRecord], filter: &F) -> (PointsBatch, AssemblyReport)
where
    F: FilterClient + ?Sized,
{
    let mut batch = PointsBatch::new();
    let mut report = AssemblyReport {
        records: records.len(),
        ..Default::default()
    };

    for record in records {
        if let Some(message) = &record.error {
            report.flagged_records += 1;
            let err = BuildError::Flagged {
                message: message.clone(),
            };
            error!(
                export_ids = ?record.export_ids,
                error = %err,
                "skipping record"
            );
            continue;
        }

        for export_id in &record.export_ids {
            let Some(args) = filter.export_args(export_id) else {
                report.failed_exports += 1;
                observability::record_export_failure(export_id);
                let err = BuildError::UnknownExport {
                    export_id: export_id.to_string(),
                };
                warn!(export_id = %export_id, error = %err, "skipping export");
                continue;
            };

            match build_point(export_id, &record.fields, &record.extra, &args) {
                Ok(point) => {
                    batch.push(&args.db_name, args.time_precision, point);
                    report.points += 1;
                }
                Err(err) => {
                    report.failed_exports += 1;
                    observability::record_export_failure(export_id);
                    error!(export_id = %export_id, error = %err, "building point failed");
                }
            }
        }
    }

    observability::record_records_skipped("flagged", report.flagged_records);
    observability::record_records_skipped("export_failed", report.failed_exports);
    debug!(
        records = report.records,
        points = report.points,
        groups = batch.group_count(),
        skipped = report.skipped(),
        "batch assembled"
    );

    (batch, report)
}
