//! # Worker
//!
//! Export loop and process lifecycle.
//!
//! - `ExportWorker`: waits for filter synchronisation, then runs
//!   pull -> assemble -> write -> persist offsets until stopped or failed
//! - `WorkerHandle`: cloneable control surface (`stop`, `is_alive`, sync signal)
//! - `Watchdog`: polls liveness probes and runs the shutdown hooks once

mod error;
mod stats;
mod watchdog;
mod worker;

pub use error::WorkerError;
pub use stats::{WorkerStats, WorkerStatsSnapshot};
pub use watchdog::{ShutdownReason, Watchdog};
pub use worker::{ExportWorker, WorkerHandle, WorkerState};
