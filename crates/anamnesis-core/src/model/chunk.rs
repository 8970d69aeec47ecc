use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Claim, Entity, Metadata};

/// A passage stored as the atomic unit of retrieval.
///
/// `id` is opaque and, once a chunk has been persisted, immutable —
/// callers retrying a write reuse the same id rather than minting a new
/// one (see [`crate::write::MemoryWriter`]'s idempotence handling).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Chunk {
    pub id: String,
    pub content: String,
    /// Populated by [`crate::embed::Embedder`]; absent until computed.
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub confidence: f64,
}

impl Chunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            embedding: None,
            metadata: Metadata::new(),
            entities: Vec::new(),
            claims: Vec::new(),
            timestamp: Utc::now(),
            source: source.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// §3 invariant: non-empty `id`/`content`/`source`, confidence in range.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.content.is_empty()
            && !self.source.is_empty()
            && (0.0..=1.0).contains(&self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_valid() {
        let c = Chunk::new("hello world", "s1", 0.9);
        assert!(c.is_valid());
        assert!(c.embedding.is_none());
    }

    #[test]
    fn confidence_is_clamped_on_construction() {
        let c = Chunk::new("x", "s1", 3.0);
        assert_eq!(c.confidence, 1.0);
        let c = Chunk::new("x", "s1", -3.0);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn empty_content_is_invalid() {
        let mut c = Chunk::new("x", "s1", 0.5);
        c.content.clear();
        assert!(!c.is_valid());
    }
}
