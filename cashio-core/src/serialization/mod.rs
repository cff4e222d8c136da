//! Deterministic binary serialization for persisted records.
//!
//! Leaf records, cached proofs, tree metadata and blob metadata are all
//! stored as bincode with a fixed configuration, so the bytes written for a
//! record never depend on platform or crate version drift.

mod bincode_config;

pub use bincode_config::{deserialize, serialize, serialized_size};
