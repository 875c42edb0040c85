//! Exporter metrics
//!
//! Thin wrappers around the `metrics` facade so metric names and labels are
//! defined in one place, plus an in-memory cycle aggregator for summaries.

use metrics::{counter, gauge, histogram};

/// Record one completed worker cycle
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_cycle;
///
/// let started = Instant::now();
/// // pull, assemble, write, persist ...
/// record_cycle(records.len(), batch.point_count(), started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_cycle(records: usize, points: usize, duration_ms: f64) {
    counter!("influx_exporter_cycles_total").increment(1);
    counter!("influx_exporter_records_total").increment(records as u64);
    counter!("influx_exporter_points_built_total").increment(points as u64);
    histogram!("influx_exporter_cycle_duration_ms").record(duration_ms);
    histogram!("influx_exporter_cycle_records").record(records as f64);
}

/// Record records (or record / export id pairs) that produced no point
pub fn record_records_skipped(reason: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "influx_exporter_records_skipped_total",
        "reason" => reason.to_string()
    )
    .increment(count as u64);
}

/// Record a point building failure for one export id
pub fn record_export_failure(export_id: &str) {
    counter!(
        "influx_exporter_export_failures_total",
        "export_id" => export_id.to_string()
    )
    .increment(1);
}

/// Record points durably written to a database
pub fn record_points_written(db_name: &str, count: usize) {
    counter!(
        "influx_exporter_points_written_total",
        "db" => db_name.to_string()
    )
    .increment(count as u64);
}

/// Record a write fallback path being taken (`create_database`, `split`)
pub fn record_write_fallback(db_name: &str, fallback: &str) {
    counter!(
        "influx_exporter_write_fallbacks_total",
        "db" => db_name.to_string(),
        "fallback" => fallback.to_string()
    )
    .increment(1);
}

/// Record points that could not be written
pub fn record_points_failed(db_name: &str, count: usize, disposition: &str) {
    counter!(
        "influx_exporter_points_failed_total",
        "db" => db_name.to_string(),
        "disposition" => disposition.to_string()
    )
    .increment(count as u64);
}

/// Record a backend write call latency
pub fn record_write_latency_ms(db_name: &str, latency_ms: f64) {
    histogram!(
        "influx_exporter_write_latency_ms",
        "db" => db_name.to_string()
    )
    .record(latency_ms);
}

/// Record an acknowledgment cursor advance
pub fn record_offsets_persisted() {
    counter!("influx_exporter_offset_commits_total").increment(1);
}

/// Record the worker liveness (1 = alive, 0 = stopped)
pub fn record_worker_alive(alive: bool) {
    gauge!("influx_exporter_worker_alive").set(if alive { 1.0 } else { 0.0 });
}

/// Cycle metrics aggregator
///
/// Aggregates in memory so a summary can be logged when the worker stops.
#[derive(Debug, Clone, Default)]
pub struct CycleMetricsAggregator {
    /// Cycles that pulled at least one record
    pub total_cycles: u64,

    /// Records pulled
    pub total_records: u64,

    /// Points written
    pub total_points: u64,

    /// Records that produced no point
    pub total_skipped: u64,

    /// Cycle duration statistics (ms)
    pub cycle_duration_ms: RunningStats,

    /// Points per cycle statistics
    pub points_per_cycle: RunningStats,
}

impl CycleMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one completed cycle
    pub fn update(&mut self, records: usize, points: usize, skipped: usize, duration_ms: f64) {
        self.total_cycles += 1;
        self.total_records += records as u64;
        self.total_points += points as u64;
        self.total_skipped += skipped as u64;
        self.cycle_duration_ms.push(duration_ms);
        self.points_per_cycle.push(points as f64);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_cycles: self.total_cycles,
            total_records: self.total_records,
            total_points: self.total_points,
            total_skipped: self.total_skipped,
            skip_rate: if self.total_records > 0 {
                self.total_skipped as f64 / self.total_records as f64 * 100.0
            } else {
                0.0
            },
            cycle_duration_ms: StatsSummary::from(&self.cycle_duration_ms),
            points_per_cycle: StatsSummary::from(&self.points_per_cycle),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub total_records: u64,
    pub total_points: u64,
    pub total_skipped: u64,
    pub skip_rate: f64,
    pub cycle_duration_ms: StatsSummary,
    pub points_per_cycle: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Export Metrics Summary ===")?;
        writeln!(f, "Cycles: {}", self.total_cycles)?;
        writeln!(f, "Records: {}", self.total_records)?;
        writeln!(f, "Points written: {}", self.total_points)?;
        writeln!(
            f,
            "Skipped records: {} ({:.2}%)",
            self.total_skipped, self.skip_rate
        )?;
        writeln!(f, "Cycle duration (ms): {}", self.cycle_duration_ms)?;
        writeln!(f, "Points per cycle: {}", self.points_per_cycle)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = CycleMetricsAggregator::new();
        aggregator.update(10, 8, 2, 12.5);
        aggregator.update(4, 4, 0, 7.5);

        assert_eq!(aggregator.total_cycles, 2);
        assert_eq!(aggregator.total_records, 14);
        assert_eq!(aggregator.total_points, 12);
        assert_eq!(aggregator.total_skipped, 2);
        assert!((aggregator.cycle_duration_ms.mean() - 10.0).abs() < 1e-10);

        aggregator.reset();
        assert_eq!(aggregator.total_cycles, 0);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = CycleMetricsAggregator::new();
        aggregator.update(100, 95, 5, 20.0);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Records: 100"));
        assert!(output.contains("5.00%"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cycle(1, 1, 0.5);
        record_records_skipped("flagged", 0);
        record_points_written("db", 3);
        record_worker_alive(false);
    }
}
