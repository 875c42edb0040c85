//! # Writer
//!
//! Delivery of assembled points to a time-series backend.
//!
//! Responsibilities:
//! - Line protocol encoding (`line_protocol`)
//! - Tiered write fallback per (database, precision) group (`pipeline`)
//! - Backend implementations: InfluxDB HTTP, dry-run logging (`sinks`)
//! - A scripted in-memory backend for tests (`mock`)

pub mod error;
pub mod line_protocol;
pub mod metrics;
pub mod mock;
pub mod pipeline;
pub mod sinks;

pub use contracts::{BackendError, BackendErrorKind, TimeSeriesBackend};
pub use error::{MeasurementCounts, WriteError};
pub use line_protocol::{encode_point, encode_points, EncodeError};
pub use metrics::{WriteMetrics, WriteMetricsSnapshot};
pub use mock::{MockBackend, WriteCall};
pub use pipeline::{WritePipeline, WriteSummary};
pub use sinks::{classify_status, InfluxHttpBackend, LogBackend};
