//! Backend implementations
//!
//! Contains InfluxHttpBackend and LogBackend.

mod influx;
mod log;

pub use self::influx::{classify_status, InfluxHttpBackend};
pub use self::log::LogBackend;
