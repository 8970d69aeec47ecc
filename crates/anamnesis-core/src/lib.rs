//! # anamnesis-core
//!
//! An agentic memory engine: a write path that chunks and extracts
//! structured knowledge from raw text and persists it with provenance
//! across a vector store, a keyword index and a property graph, and a
//! read path that fans a query out across all three, fuses the results
//! with reciprocal rank fusion, and re-ranks them on relevance,
//! freshness, authority, quality, diversity and personalization.
//!
//! ## Write path
//!
//! [`write::MemoryWriter`] drives [`process::ContentProcessor`] (chunk +
//! extract entities/claims), [`resolve::EntityResolver`] (cross-batch
//! dedup and linking), and persists the result across the three store
//! contracts in [`stores`].
//!
//! ## Read path
//!
//! [`read::MemoryReader`] drives [`query::QueryProcessor`] (parse +
//! expand), the three [`search`] retrievers concurrently, [`fuse::ResultFuser`]
//! and [`rank::ResultRanker`], and assembles the response envelope
//! including provenance, conflicts and community cards.
//!
//! Neither path invokes an embedding model directly; both depend on the
//! [`embed::Embedder`] contract.

pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod fuse;
pub mod model;
pub mod process;
pub mod query;
pub mod rank;
pub mod read;
pub mod resolve;
pub mod search;
pub mod stores;
pub mod write;

pub use config::AnamnesisConfig;
pub use error::{MemoryError, Result};
pub use model::{Chunk, Claim, EdgeType, Entity, EntityType, GraphEdge, GraphNode, Metadata, NodeType, ProvenanceRecord};
pub use read::{CommunityCard, ConflictInfo, Evidence, MemoryReader, RecallArgs, RecallResult, RetrievalStats};
pub use write::{MemoryWriter, WriteMetadata, WriteResult};

/// Crate version, surfaced over the `manage` RPC's status report.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::config::AnamnesisConfig;
    pub use crate::embed::{Embedder, HashEmbedder};
    pub use crate::error::{MemoryError, Result};
    pub use crate::model::{Chunk, Claim, Entity, EntityType, Metadata};
    pub use crate::read::{MemoryReader, RecallArgs, RecallResult};
    pub use crate::stores::{GraphStore, SearchIndex, VectorStore};
    pub use crate::write::{MemoryWriter, WriteMetadata, WriteResult};
}
