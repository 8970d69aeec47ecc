use async_trait::async_trait;
use thiserror::Error;

use crate::model::Metadata;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VectorStoreError {
    #[error("vector store connection error: {0}")]
    Connection(String),
    #[error("vector not found: {0}")]
    NotFound(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A single ranked match from [`VectorStore::search`].
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    /// Normalised to `[0,1]`; cosine similarity by convention, higher
    /// is better (§4.8).
    pub score: f32,
    pub metadata: Metadata,
}

/// Dense-vector index contract (§6.1).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), VectorStoreError>;

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filters: &Metadata,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError>;

    async fn contains(&self, id: &str) -> Result<bool, VectorStoreError>;

    async fn health(&self) -> Result<(), VectorStoreError>;
}
