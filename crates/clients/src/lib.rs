//! # Clients
//!
//! Concrete collaborators for running the exporter without a broker.
//!
//! - `StaticFilterClient`: export definitions from a JSON file
//! - `JsonlDataClient`: matched records replayed from a JSON-lines file,
//!   with the committed position kept in a sidecar offset file
//! - `MemoryDataClient`: scripted batches for tests

mod filter;
mod jsonl;
mod memory;

pub use filter::StaticFilterClient;
pub use jsonl::JsonlDataClient;
pub use memory::MemoryDataClient;
