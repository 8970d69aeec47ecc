//! Core data model shared by the write and read paths.
//!
//! Chunks, Entities and Claims are produced by the write path (see
//! [`crate::write`]) and referenced by id from the graph view
//! ([`GraphNode`]/[`GraphEdge`]). None of these types enforce their own
//! invariants on construction — validation happens at the point a value
//! is about to be persisted, so that extractors can freely build and
//! discard candidates without threading `Result` through every field
//! assignment.

mod chunk;
mod claim;
mod entity;
mod graph;
mod provenance;

pub use chunk::Chunk;
pub use claim::Claim;
pub use entity::{Entity, EntityType};
pub use graph::{EdgeType, GraphEdge, GraphNode, NodeType};
pub use provenance::ProvenanceRecord;

use std::collections::HashMap;

/// Free-form key/value bag attached to chunks, entities, nodes and edges.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Clamp a score into the closed unit interval, as every sub-score and
/// final score in the ranking and fusion stages requires.
pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
