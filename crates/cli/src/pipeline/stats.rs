//! Run statistics reported when the exporter exits.

use std::time::Duration;

use worker::{ShutdownReason, WorkerStatsSnapshot};
use writer::WriteMetricsSnapshot;

/// Totals of one exporter run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub duration: Duration,
    pub worker: WorkerStatsSnapshot,
    pub writes: WriteMetricsSnapshot,
    pub reason: ShutdownReason,
}

impl RunStats {
    /// Records consumed per second
    pub fn records_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.worker.records as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to stdout
    pub fn print_summary(&self) {
        println!();
        println!("Export summary");
        println!("  Stopped:            {}", self.reason);
        println!("  Duration:           {:.2}s", self.duration.as_secs_f64());
        println!("  Cycles:             {}", self.worker.cycles);
        println!(
            "  Records:            {} ({:.1}/s)",
            self.worker.records,
            self.records_per_second()
        );
        println!("  Records skipped:    {}", self.worker.records_skipped);
        println!("  Export failures:    {}", self.worker.export_failures);
        println!("  Points written:     {}", self.writes.points_written);
        println!("  Points discarded:   {}", self.writes.points_discarded);
        println!("  Measurement splits: {}", self.writes.splits);
        println!("  Databases created:  {}", self.writes.databases_created);
        println!("  Offset commits:     {}", self.worker.commits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_per_second() {
        let stats = RunStats {
            duration: Duration::from_secs(2),
            worker: WorkerStatsSnapshot {
                records: 100,
                ..Default::default()
            },
            writes: WriteMetricsSnapshot::default(),
            reason: ShutdownReason::Cancelled,
        };
        assert!((stats.records_per_second() - 50.0).abs() < f64::EPSILON);

        let instant = RunStats {
            duration: Duration::ZERO,
            ..stats
        };
        assert_eq!(instant.records_per_second(), 0.0);
    }
}
