//! # Assembler
//!
//! Record-to-point transformation.
//!
//! Responsibilities:
//! - Type casts of field and tag values (`casts`)
//! - Single point construction, timestamp re-formatting (`point`)
//! - Grouping of a pulled batch by database and time precision (`batch`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use assembler::assemble;
//!
//! let pulled = data_client.pull_batch(timeout, limit).await?;
//! let (batch, report) = assemble(&pulled.records, filter_client.as_ref());
//! for group in batch.groups() {
//!     // one write call per (db, precision)
//! }
//! ```

mod batch;
mod casts;
mod error;
mod point;

// Re-exports
pub use batch::{assemble, AssemblyReport};
pub use casts::{cast, cast_entries, cast_value};
pub use error::{BuildError, Result};
pub use point::{build_point, convert_timestamp};
