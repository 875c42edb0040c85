//! Write pipeline counters
//!
//! Lock-free counters readable while the pipeline is writing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one write pipeline
#[derive(Debug, Default)]
pub struct WriteMetrics {
    /// Groups written (including after a fallback)
    groups_written: AtomicU64,
    /// Points durably written
    points_written: AtomicU64,
    /// Points dropped by the discard split policy
    points_discarded: AtomicU64,
    /// Databases created on demand
    databases_created: AtomicU64,
    /// Groups split per measurement
    splits: AtomicU64,
    /// Fatal write errors
    failures: AtomicU64,
}

impl WriteMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups_written(&self) -> u64 {
        self.groups_written.load(Ordering::Relaxed)
    }

    pub fn points_written(&self) -> u64 {
        self.points_written.load(Ordering::Relaxed)
    }

    /// Account a successful backend write of `points` points
    pub fn add_points_written(&self, points: usize) {
        self.points_written
            .fetch_add(points as u64, Ordering::Relaxed);
    }

    pub fn inc_groups_written(&self) {
        self.groups_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn points_discarded(&self) -> u64 {
        self.points_discarded.load(Ordering::Relaxed)
    }

    pub fn add_points_discarded(&self, points: usize) {
        self.points_discarded
            .fetch_add(points as u64, Ordering::Relaxed);
    }

    pub fn databases_created(&self) -> u64 {
        self.databases_created.load(Ordering::Relaxed)
    }

    pub fn inc_databases_created(&self) {
        self.databases_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn splits(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    pub fn inc_splits(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> WriteMetricsSnapshot {
        WriteMetricsSnapshot {
            groups_written: self.groups_written(),
            points_written: self.points_written(),
            points_discarded: self.points_discarded(),
            databases_created: self.databases_created(),
            splits: self.splits(),
            failures: self.failures(),
        }
    }
}

/// Snapshot of write counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteMetricsSnapshot {
    pub groups_written: u64,
    pub points_written: u64,
    pub points_discarded: u64,
    pub databases_created: u64,
    pub splits: u64,
    pub failures: u64,
}
