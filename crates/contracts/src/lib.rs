//! # Contracts
//!
//! Frozen interface contracts shared by every exporter crate: the data model
//! (export definitions, matched records, points), the error taxonomy and the
//! collaborator traits. Business crates depend on this crate only, reverse
//! dependencies are prohibited.
//!
//! ## Delivery model
//! - Records arrive already filtered, tagged with the export ids they matched
//! - Points are grouped per (database, time precision) and written per group
//! - Offsets are persisted only after every group of a cycle was written

mod backend;
mod collaborators;
mod config;
mod error;
mod export;
mod export_id;
mod point;
mod record;

pub use backend::*;
pub use collaborators::*;
pub use config::*;
pub use error::*;
pub use export::*;
pub use export_id::ExportId;
pub use point::*;
pub use record::*;
