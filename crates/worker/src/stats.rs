//! Worker run statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one export worker, readable while it runs
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Cycles that pulled at least one record
    cycles: AtomicU64,
    records: AtomicU64,
    points_written: AtomicU64,
    /// Records that produced no point at all
    records_skipped: AtomicU64,
    /// (record, export id) pairs that failed to build
    export_failures: AtomicU64,
    /// Cycles whose offsets were persisted
    commits: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn points_written(&self) -> u64 {
        self.points_written.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn export_failures(&self) -> u64 {
        self.export_failures.load(Ordering::Relaxed)
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Account one cycle that pulled `records` records
    pub fn record_cycle(&self, records: usize, skipped: usize, export_failures: usize) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(records as u64, Ordering::Relaxed);
        self.records_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
        self.export_failures
            .fetch_add(export_failures as u64, Ordering::Relaxed);
    }

    pub fn add_points_written(&self, points: usize) {
        self.points_written
            .fetch_add(points as u64, Ordering::Relaxed);
    }

    pub fn inc_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            cycles: self.cycles(),
            records: self.records(),
            points_written: self.points_written(),
            records_skipped: self.records_skipped(),
            export_failures: self.export_failures(),
            commits: self.commits(),
        }
    }
}

/// Point-in-time copy of `WorkerStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub cycles: u64,
    pub records: u64,
    pub points_written: u64,
    pub records_skipped: u64,
    pub export_failures: u64,
    pub commits: u64,
}
