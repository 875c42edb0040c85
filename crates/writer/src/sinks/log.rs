//! LogBackend - logs write summaries via tracing instead of sending them

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use contracts::{
    points_per_measurement, BackendError, BackendErrorKind, ContractError, Point, ShutdownHook,
    TimePrecision, TimeSeriesBackend,
};
use tracing::{debug, info, instrument};

use crate::line_protocol::encode_points;

/// Backend that accepts every write and logs it (dry runs)
pub struct LogBackend {
    name: String,
    points_logged: AtomicU64,
    closed: AtomicBool,
}

impl LogBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points_logged: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Points accepted since creation
    pub fn points_logged(&self) -> u64 {
        self.points_logged.load(Ordering::Relaxed)
    }
}

impl TimeSeriesBackend for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_backend_write",
        skip(self, points),
        fields(backend = %self.name, points = points.len())
    )]
    async fn write_points(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::closed(&self.name));
        }
        let body = encode_points(points, time_precision)
            .map_err(|e| BackendError::new(BackendErrorKind::BadRequest, e.to_string()))?;

        info!(
            backend = %self.name,
            db = db_name,
            precision = time_precision.map(|p| p.as_str()).unwrap_or("ns"),
            points = points.len(),
            measurements = ?points_per_measurement(points),
            "points received"
        );
        debug!(backend = %self.name, "{body}");

        self.points_logged
            .fetch_add(points.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    #[instrument(name = "log_backend_create_database", skip(self))]
    async fn create_database(&self, db_name: &str) -> Result<(), BackendError> {
        info!(backend = %self.name, db = db_name, "create database requested");
        Ok(())
    }
}

impl ShutdownHook for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<(), ContractError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(
                backend = %self.name,
                points = self.points_logged(),
                "LogBackend closed"
            );
        }
        Ok(())
    }
}
