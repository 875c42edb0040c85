//! Write Pipeline
//!
//! Writes a `PointsBatch` one (database, precision) group at a time with
//! tiered recovery:
//!
//! 1. one batched write
//! 2. database not found: create it, retry once
//! 3. batch rejected (bad request / too large): split by measurement and
//!    write each measurement on its own, then apply the `SplitFailurePolicy`
//! 4. anything else: fatal `WriteError`
//!
//! Groups are written in order; the first fatal error aborts the batch.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    BackendError, BackendErrorKind, ExportId, Point, PointsBatch, SplitFailurePolicy,
    TimePrecision, TimeSeriesBackend,
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{MeasurementCounts, WriteError};
use crate::metrics::WriteMetrics;

/// Outcome of writing one batch or group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Groups handled
    pub groups: usize,
    /// Points durably written
    pub points_written: usize,
    /// Points dropped by the discard split policy
    pub points_discarded: usize,
}

impl AddAssign for WriteSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.groups += rhs.groups;
        self.points_written += rhs.points_written;
        self.points_discarded += rhs.points_discarded;
    }
}

/// Tiered-fallback writer over a `TimeSeriesBackend`
pub struct WritePipeline<B> {
    backend: Arc<B>,
    split_failure: SplitFailurePolicy,
    metrics: Arc<WriteMetrics>,
}

impl<B> Clone for WritePipeline<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            split_failure: self.split_failure,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B> WritePipeline<B>
where
    B: TimeSeriesBackend + Sync,
{
    pub fn new(backend: Arc<B>, split_failure: SplitFailurePolicy) -> Self {
        Self {
            backend,
            split_failure,
            metrics: Arc::new(WriteMetrics::new()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn metrics(&self) -> Arc<WriteMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Write every group of `batch`
    ///
    /// # Errors
    /// The first fatal group error; later groups are not attempted.
    #[instrument(
        name = "write_batch",
        skip(self, batch),
        fields(groups = batch.group_count(), points = batch.point_count())
    )]
    pub async fn write_batch(&self, batch: &PointsBatch) -> Result<WriteSummary, WriteError> {
        let mut summary = WriteSummary::default();
        for group in batch.groups() {
            summary += self
                .write_group(group.db_name, group.time_precision, group.points)
                .await?;
        }
        Ok(summary)
    }

    /// Write one (database, precision) group
    pub async fn write_group(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<WriteSummary, WriteError> {
        let result = match self.write_once(db_name, time_precision, points).await {
            Ok(()) => Ok(self.written(points.len())),
            Err(err) if err.kind == BackendErrorKind::DatabaseNotFound => {
                self.create_and_retry(db_name, time_precision, points).await
            }
            Err(err) if err.kind.is_batch_rejection() => {
                self.write_split(db_name, time_precision, points, err).await
            }
            Err(err) => Err(WriteError::batch(db_name, points, err)),
        };

        match &result {
            Ok(summary) => {
                self.metrics.inc_groups_written();
                debug!(
                    db = db_name,
                    precision = ?time_precision,
                    points = summary.points_written,
                    "group written"
                );
            }
            Err(err) => {
                self.metrics.inc_failures();
                observability::record_points_failed(db_name, err.counts().total(), "fatal");
            }
        }
        result
    }

    async fn write_once(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self
            .backend
            .write_points(db_name, time_precision, points)
            .await;
        if result.is_ok() {
            self.metrics.add_points_written(points.len());
            observability::record_points_written(db_name, points.len());
            observability::record_write_latency_ms(
                db_name,
                started.elapsed().as_secs_f64() * 1000.0,
            );
        }
        result
    }

    async fn create_and_retry(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<WriteSummary, WriteError> {
        warn!(db = db_name, "database not found, creating it");
        observability::record_write_fallback(db_name, "create_database");

        self.backend
            .create_database(db_name)
            .await
            .map_err(|e| WriteError::batch(db_name, points, e))?;
        self.metrics.inc_databases_created();
        info!(db = db_name, "database created");

        self.write_once(db_name, time_precision, points)
            .await
            .map_err(|e| WriteError::batch(db_name, points, e))?;
        Ok(self.written(points.len()))
    }

    async fn write_split(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
        cause: BackendError,
    ) -> Result<WriteSummary, WriteError> {
        let by_measurement = split_by_measurement(points);
        warn!(
            db = db_name,
            reason = %cause,
            measurements = by_measurement.len(),
            "batch rejected, writing per measurement"
        );
        self.metrics.inc_splits();
        observability::record_write_fallback(db_name, "split");

        let mut summary = WriteSummary {
            groups: 1,
            ..Default::default()
        };
        let mut rejected = MeasurementCounts::default();
        let mut first_rejection = None;
        let mut failed = MeasurementCounts::default();
        let mut first_failure = None;

        for (measurement, group) in &by_measurement {
            match self.write_once(db_name, time_precision, group).await {
                Ok(()) => summary.points_written += group.len(),
                Err(err) => {
                    error!(
                        db = db_name,
                        measurement = %measurement,
                        points = group.len(),
                        error = %err,
                        "writing measurement failed"
                    );
                    if err.kind.is_batch_rejection() {
                        rejected.0.insert(measurement.clone(), group.len());
                        first_rejection.get_or_insert(err);
                    } else {
                        failed.0.insert(measurement.clone(), group.len());
                        first_failure.get_or_insert(err);
                    }
                }
            }
        }

        // only rejections are subject to the split policy
        if let Some(source) = first_failure {
            failed.0.extend(rejected.0);
            return Err(WriteError::Split {
                db_name: db_name.to_string(),
                counts: failed,
                source,
            });
        }

        let Some(source) = first_rejection else {
            return Ok(summary);
        };

        match self.split_failure {
            SplitFailurePolicy::Discard => {
                let discarded = rejected.total();
                warn!(
                    db = db_name,
                    points_per_measurement = %rejected,
                    "discarding rejected measurements"
                );
                self.metrics.add_points_discarded(discarded);
                observability::record_points_failed(db_name, discarded, "discarded");
                summary.points_discarded = discarded;
                Ok(summary)
            }
            SplitFailurePolicy::Escalate => Err(WriteError::Split {
                db_name: db_name.to_string(),
                counts: rejected,
                source,
            }),
        }
    }

    fn written(&self, points: usize) -> WriteSummary {
        WriteSummary {
            groups: 1,
            points_written: points,
            points_discarded: 0,
        }
    }
}

/// Points grouped by measurement, in order of first appearance
fn split_by_measurement(points: &[Point]) -> Vec<(ExportId, Vec<Point>)> {
    let mut groups: Vec<(ExportId, Vec<Point>)> = Vec::new();
    for point in points {
        match groups.iter_mut().find(|(m, _)| *m == point.measurement) {
            Some((_, group)) => group.push(point.clone()),
            None => groups.push((point.measurement.clone(), vec![point.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use serde_json::{json, Map};

    fn point(measurement: &str, v: i64) -> Point {
        let mut fields = Map::new();
        fields.insert("v".into(), json!(v));
        Point {
            measurement: ExportId::from(measurement),
            fields,
            tags: None,
            time: None,
        }
    }

    fn pipeline(backend: MockBackend, policy: SplitFailurePolicy) -> WritePipeline<MockBackend> {
        WritePipeline::new(Arc::new(backend), policy)
    }

    #[tokio::test]
    async fn test_single_write_per_group() {
        let p = pipeline(MockBackend::new(), SplitFailurePolicy::Escalate);
        let mut batch = PointsBatch::new();
        batch.push("db1", None, point("a", 1));
        batch.push("db1", None, point("b", 2));
        batch.push("db2", Some(TimePrecision::Seconds), point("a", 3));

        let summary = p.write_batch(&batch).await.unwrap();

        assert_eq!(summary.groups, 2);
        assert_eq!(summary.points_written, 3);
        let written = p.backend().written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].db_name, "db1");
        assert_eq!(written[0].points.len(), 2);
        assert_eq!(written[1].time_precision, Some(TimePrecision::Seconds));
    }

    #[tokio::test]
    async fn test_missing_database_is_created_once() {
        let backend = MockBackend::new().with_databases(Vec::<String>::new());
        let p = pipeline(backend, SplitFailurePolicy::Escalate);
        let points = vec![point("a", 1), point("a", 2)];

        let summary = p.write_group("fresh", None, &points).await.unwrap();

        assert_eq!(summary.points_written, 2);
        assert_eq!(p.backend().created_databases(), vec!["fresh".to_string()]);
        assert_eq!(p.backend().attempts(), 2);
        assert_eq!(p.backend().written_points(), 2);
        assert_eq!(p.metrics().snapshot().databases_created, 1);
    }

    #[tokio::test]
    async fn test_second_not_found_is_fatal() {
        let backend = MockBackend::new();
        backend.push_failures(BackendErrorKind::DatabaseNotFound, 2);
        let p = pipeline(backend, SplitFailurePolicy::Escalate);

        let err = p.write_group("db", None, &[point("a", 1)]).await.unwrap_err();

        assert_eq!(err.kind(), BackendErrorKind::DatabaseNotFound);
        assert_eq!(p.backend().attempts(), 2);
        assert_eq!(p.metrics().failures(), 1);
    }

    #[tokio::test]
    async fn test_create_database_failure_is_fatal() {
        let backend = MockBackend::new()
            .with_databases(["other"])
            .fail_create_database(BackendErrorKind::Unauthorized);
        let p = pipeline(backend, SplitFailurePolicy::Escalate);

        let err = p.write_group("db", None, &[point("a", 1)]).await.unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::Unauthorized);
        assert_eq!(err.db_name(), "db");
    }

    #[tokio::test]
    async fn test_split_isolates_rejected_measurement_discard() {
        let backend = MockBackend::new().reject_measurement("bad", BackendErrorKind::BadRequest);
        let p = pipeline(backend, SplitFailurePolicy::Discard);
        let points = vec![point("good", 1), point("bad", 2), point("good", 3)];

        let summary = p.write_group("db", None, &points).await.unwrap();

        assert_eq!(summary.points_written, 2);
        assert_eq!(summary.points_discarded, 1);
        let written = p.backend().written();
        assert_eq!(written.len(), 1);
        assert!(written[0].points.iter().all(|pt| pt.measurement == "good"));
        assert_eq!(p.metrics().snapshot().points_discarded, 1);
    }

    #[tokio::test]
    async fn test_split_escalates_after_all_siblings() {
        let backend =
            MockBackend::new().reject_measurement("bad", BackendErrorKind::PayloadTooLarge);
        let p = pipeline(backend, SplitFailurePolicy::Escalate);
        let points = vec![point("bad", 1), point("good", 2)];

        let err = p.write_group("db", None, &points).await.unwrap_err();

        assert!(matches!(err, WriteError::Split { .. }));
        assert_eq!(err.counts().total(), 1);
        // sibling after the rejected measurement was still written
        assert_eq!(p.backend().written_points(), 1);
    }

    #[tokio::test]
    async fn test_split_outage_is_fatal_under_discard() {
        let backend = MockBackend::new();
        backend.push_failures(BackendErrorKind::BadRequest, 1);
        backend.push_failures(BackendErrorKind::Unavailable, 1);
        let p = pipeline(backend, SplitFailurePolicy::Discard);
        let points = vec![point("m1", 1), point("m2", 2)];

        let err = p.write_group("db", None, &points).await.unwrap_err();

        assert_eq!(err.kind(), BackendErrorKind::Unavailable);
        assert_eq!(err.counts().total(), 1);
        // m2 was still attempted and written
        assert_eq!(p.backend().attempts(), 3);
        assert_eq!(p.backend().written_points(), 1);
        assert_eq!(p.metrics().snapshot().points_discarded, 0);
    }

    #[tokio::test]
    async fn test_other_error_is_fatal_with_counts() {
        let backend = MockBackend::new();
        backend.push_failures(BackendErrorKind::Unavailable, 1);
        let p = pipeline(backend, SplitFailurePolicy::Escalate);
        let points = vec![point("a", 1), point("b", 2), point("a", 3)];

        let err = p.write_group("db", None, &points).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("database='db'"), "got: {message}");
        assert!(message.contains("{a: 2, b: 1}"), "got: {message}");
        assert_eq!(p.backend().attempts(), 1);
    }

    #[tokio::test]
    async fn test_first_fatal_group_aborts_batch() {
        let backend = MockBackend::new();
        backend.push_failures(BackendErrorKind::Unavailable, 1);
        let p = pipeline(backend, SplitFailurePolicy::Escalate);
        let mut batch = PointsBatch::new();
        batch.push("db1", None, point("a", 1));
        batch.push("db2", None, point("a", 2));

        assert!(p.write_batch(&batch).await.is_err());
        assert_eq!(p.backend().attempts(), 1);
    }

    #[test]
    fn test_split_by_measurement_keeps_order() {
        let points = vec![point("b", 1), point("a", 2), point("b", 3)];
        let groups = split_by_measurement(&points);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "a");
    }
}
