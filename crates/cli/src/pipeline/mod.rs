//! Exporter wiring: collaborators, worker, watchdog.

mod orchestrator;
mod stats;

pub use orchestrator::Exporter;
pub use stats::RunStats;
