use async_trait::async_trait;
use thiserror::Error;

use crate::model::Metadata;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SearchIndexError {
    #[error("search index connection error: {0}")]
    Connection(String),
    #[error("document not found: {0}")]
    NotFound(String),
}

/// A document to be persisted in the inverted keyword index.
#[derive(Debug, Clone)]
pub struct IndexedDoc {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// Query-time options for [`SearchIndex::search`] (§6.1).
#[derive(Debug, Clone, Default)]
pub struct SearchQueryOpts {
    pub limit: usize,
    pub offset: usize,
    pub filters: Metadata,
    pub highlight: bool,
}

/// A single match from [`SearchIndex::search`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub content: String,
    pub metadata: Metadata,
    pub highlights: Option<Vec<String>>,
}

/// Inverted keyword-index contract (§6.1). Backs both BM25 retrieval
/// (C10) and name-based entity-resolution lookups (C5), and surfaces
/// corpus-size metadata so C10 can compute `idf`.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, doc: IndexedDoc) -> Result<(), SearchIndexError>;

    async fn update(&self, doc: IndexedDoc) -> Result<(), SearchIndexError>;

    async fn delete(&self, id: &str) -> Result<(), SearchIndexError>;

    async fn search(
        &self,
        query: &str,
        opts: &SearchQueryOpts,
    ) -> Result<Vec<SearchHit>, SearchIndexError>;

    async fn suggest(
        &self,
        prefix: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<String>, SearchIndexError>;

    async fn batch_index(&self, docs: Vec<IndexedDoc>) -> Result<(), SearchIndexError>;

    async fn contains(&self, id: &str) -> Result<bool, SearchIndexError>;

    async fn document_count(&self) -> Result<usize, SearchIndexError>;

    async fn index_size(&self) -> Result<usize, SearchIndexError>;

    async fn health(&self) -> Result<(), SearchIndexError>;

    async fn close(&self) -> Result<(), SearchIndexError>;
}
