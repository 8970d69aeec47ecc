use std::sync::Arc;

use crate::error::{MemoryError, Result};
use crate::fuse::FusionItem;
use crate::model::Metadata;
use crate::stores::VectorStore;

/// Thin wrapper over [`VectorStore::search`] that shapes hits into
/// rank-assigned [`FusionItem`]s (§4.8, C9).
pub struct VectorSearcher {
    store: Arc<dyn VectorStore>,
}

impl VectorSearcher {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn search(&self, embedding: &[f32], k: usize, filters: &Metadata) -> Result<Vec<FusionItem>> {
        let hits = self
            .store
            .search(embedding, k, filters)
            .await
            .map_err(|e| MemoryError::persistence("vector_store", e))?;

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| FusionItem {
                id: hit.id,
                content: hit
                    .metadata
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score: hit.score as f64,
                rank: i + 1,
                metadata: hit.metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryVectorStore;

    #[tokio::test]
    async fn ranks_are_one_based_in_score_order() {
        let store = Arc::new(InMemoryVectorStore::new());
        store.upsert("a", vec![1.0, 0.0], Metadata::new()).await.unwrap();
        store.upsert("b", vec![0.0, 1.0], Metadata::new()).await.unwrap();
        let searcher = VectorSearcher::new(store);
        let hits = searcher.search(&[1.0, 0.0], 10, &Metadata::new()).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].rank, 1);
    }
}
