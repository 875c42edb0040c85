//! Command implementations.

mod run;
mod validate;

pub use run::run_exporter;
pub use validate::run_validate;
