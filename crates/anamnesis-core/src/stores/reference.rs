//! In-process reference adapters for the three store traits (§6.1,
//! "Reference adapters (ambient, C17)").
//!
//! These exist so the rest of the crate is runnable end-to-end without
//! an external backend: a flat cosine-scan vector index, an
//! adjacency-list graph, and a hand-rolled inverted keyword index. They
//! are illustrative and correct, not a performance claim — a real
//! deployment wanting an ANN index, a graph database, or a full-text
//! engine implements the same traits.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::model::{GraphEdge, GraphNode, Metadata};

use super::graph_store::{GraphStore, GraphStoreError, NeighborQuery, Direction};
use super::search_index::{IndexedDoc, SearchHit, SearchIndex, SearchIndexError, SearchQueryOpts};
use super::vector_store::{VectorHit, VectorStore, VectorStoreError};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }
}

/// Returns true if every `k:v` pair in `filters` matches `metadata`.
fn matches_filters(metadata: &Metadata, filters: &Metadata) -> bool {
    filters.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

struct VectorRecord {
    vector: Vec<f32>,
    metadata: Metadata,
}

/// Flat `Vec<(id, vector, metadata)>` cosine scan — correct, not
/// asymptotically competitive with an ANN index, which §6.1 puts out
/// of scope for this crate.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), VectorStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| VectorStoreError::Connection("lock poisoned".into()))?;
        records.insert(id.to_string(), VectorRecord { vector, metadata });
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filters: &Metadata,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| VectorStoreError::Connection("lock poisoned".into()))?;
        let mut hits: Vec<VectorHit> = records
            .iter()
            .filter(|(_, rec)| matches_filters(&rec.metadata, filters))
            .map(|(id, rec)| VectorHit {
                id: id.clone(),
                score: ((cosine(vector, &rec.vector) + 1.0) / 2.0).clamp(0.0, 1.0),
                metadata: rec.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| VectorStoreError::Connection("lock poisoned".into()))?;
        records.remove(id);
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool, VectorStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| VectorStoreError::Connection("lock poisoned".into()))?;
        Ok(records.contains_key(id))
    }

    async fn health(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

/// `HashMap<id, Node>` + edge list, deduping `create_edge` on
/// `(from, to, type)` per §7.
#[derive(Default)]
pub struct InMemoryGraphStore {
    nodes: RwLock<HashMap<String, GraphNode>>,
    edges: RwLock<Vec<GraphEdge>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn create_node(&self, node: GraphNode) -> Result<(), GraphStoreError> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
        nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>, GraphStoreError> {
        let nodes = self
            .nodes
            .read()
            .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
        Ok(nodes.get(id).cloned())
    }

    async fn create_edge(&self, edge: GraphEdge) -> Result<(), GraphStoreError> {
        {
            let nodes = self
                .nodes
                .read()
                .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
            if !nodes.contains_key(&edge.from) {
                return Err(GraphStoreError::DanglingEdge(edge.from.clone()));
            }
            if !nodes.contains_key(&edge.to) {
                return Err(GraphStoreError::DanglingEdge(edge.to.clone()));
            }
        }
        let mut edges = self
            .edges
            .write()
            .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
        let key = edge.dedup_key();
        if let Some(existing) = edges.iter_mut().find(|e| e.dedup_key() == key) {
            *existing = edge;
        } else {
            edges.push(edge);
        }
        Ok(())
    }

    async fn neighbors(
        &self,
        id: &str,
        query: &NeighborQuery,
    ) -> Result<Vec<GraphEdge>, GraphStoreError> {
        let edges = self
            .edges
            .read()
            .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
        let direction = query.direction.unwrap_or(Direction::Outgoing);
        let matches = edges.iter().filter(|e| {
            let endpoint_matches = match direction {
                Direction::Outgoing => e.from == id,
                Direction::Incoming => e.to == id,
                Direction::Both => e.from == id || e.to == id,
            };
            if !endpoint_matches {
                return false;
            }
            if let Some(types) = &query.edge_types {
                if !types.contains(&e.edge_type) {
                    return false;
                }
            }
            if let Some(min_weight) = query.min_weight {
                if e.weight < min_weight {
                    return false;
                }
            }
            true
        });
        Ok(matches.cloned().collect())
    }

    async fn delete_node(&self, id: &str) -> Result<(), GraphStoreError> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
        nodes.remove(id);
        let mut edges = self
            .edges
            .write()
            .map_err(|_| GraphStoreError::Connection("lock poisoned".into()))?;
        edges.retain(|e| e.from != id && e.to != id);
        Ok(())
    }

    async fn health(&self) -> Result<(), GraphStoreError> {
        Ok(())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

struct IndexedDocRecord {
    content: String,
    metadata: Metadata,
}

/// Inverted index `HashMap<token, HashSet<id>>` over a document table,
/// exposing corpus-size metadata for C10's `idf` calculation.
#[derive(Default)]
pub struct InMemorySearchIndex {
    docs: RwLock<HashMap<String, IndexedDocRecord>>,
    postings: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex(&self, id: &str, content: &str) -> Result<(), SearchIndexError> {
        let mut postings = self
            .postings
            .write()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        for ids in postings.values_mut() {
            ids.remove(id);
        }
        for token in tokenize(content) {
            postings.entry(token).or_default().insert(id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index(&self, doc: IndexedDoc) -> Result<(), SearchIndexError> {
        self.reindex(&doc.id, &doc.content)?;
        let mut docs = self
            .docs
            .write()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        docs.insert(
            doc.id,
            IndexedDocRecord {
                content: doc.content,
                metadata: doc.metadata,
            },
        );
        Ok(())
    }

    async fn update(&self, doc: IndexedDoc) -> Result<(), SearchIndexError> {
        self.index(doc).await
    }

    async fn delete(&self, id: &str) -> Result<(), SearchIndexError> {
        let mut postings = self
            .postings
            .write()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        for ids in postings.values_mut() {
            ids.remove(id);
        }
        drop(postings);
        let mut docs = self
            .docs
            .write()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        docs.remove(id);
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchQueryOpts,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        let postings = self
            .postings
            .read()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;

        let query_tokens = tokenize(query);
        let mut scores: HashMap<String, usize> = HashMap::new();
        if query_tokens.is_empty() {
            // name/prefix style lookups (used by entity resolution) fall
            // back to substring matching across the whole corpus.
            let needle = query.to_lowercase();
            for (id, rec) in docs.iter() {
                if rec.content.to_lowercase().contains(&needle) {
                    scores.insert(id.clone(), 1);
                }
            }
        } else {
            for token in &query_tokens {
                if let Some(ids) = postings.get(token) {
                    for id in ids {
                        *scores.entry(id.clone()).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .filter_map(|(id, matched)| {
                let rec = docs.get(&id)?;
                if !matches_filters(&rec.metadata, &opts.filters) {
                    return None;
                }
                Some(SearchHit {
                    id,
                    score: matched as f64 / query_tokens.len().max(1) as f64,
                    content: rec.content.clone(),
                    metadata: rec.metadata.clone(),
                    highlights: None,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let offset = opts.offset.min(hits.len());
        let limit = if opts.limit == 0 { hits.len() } else { opts.limit };
        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }

    async fn suggest(
        &self,
        prefix: &str,
        _field: &str,
        limit: usize,
    ) -> Result<Vec<String>, SearchIndexError> {
        let postings = self
            .postings
            .read()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        let prefix = prefix.to_lowercase();
        let mut matches: Vec<String> = postings
            .keys()
            .filter(|t| t.starts_with(&prefix))
            .cloned()
            .collect();
        matches.sort();
        matches.truncate(limit);
        Ok(matches)
    }

    async fn batch_index(&self, docs: Vec<IndexedDoc>) -> Result<(), SearchIndexError> {
        for doc in docs {
            self.index(doc).await?;
        }
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool, SearchIndexError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        Ok(docs.contains_key(id))
    }

    async fn document_count(&self) -> Result<usize, SearchIndexError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        Ok(docs.len())
    }

    async fn index_size(&self) -> Result<usize, SearchIndexError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| SearchIndexError::Connection("lock poisoned".into()))?;
        Ok(docs.values().map(|d| d.content.len()).sum())
    }

    async fn health(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vector_store_upsert_then_search_round_trip() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("a", vec![1.0, 0.0], Metadata::new())
            .await
            .unwrap();
        store
            .upsert("b", vec![0.0, 1.0], Metadata::new())
            .await
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 1, &Metadata::new()).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn graph_store_dedups_edges_on_from_to_type() {
        let store = InMemoryGraphStore::new();
        store
            .create_node(GraphNode::new("a", crate::model::NodeType::ChunkNode))
            .await
            .unwrap();
        store
            .create_node(GraphNode::new("b", crate::model::NodeType::ChunkNode))
            .await
            .unwrap();
        store
            .create_edge(GraphEdge::new("e1", "a", "b", crate::model::EdgeType::RelatedTo, 0.5))
            .await
            .unwrap();
        store
            .create_edge(GraphEdge::new("e2", "a", "b", crate::model::EdgeType::RelatedTo, 0.9))
            .await
            .unwrap();
        let edges = store
            .neighbors("a", &NeighborQuery::default())
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 0.9);
    }

    #[tokio::test]
    async fn graph_store_rejects_dangling_edge() {
        let store = InMemoryGraphStore::new();
        store
            .create_node(GraphNode::new("a", crate::model::NodeType::ChunkNode))
            .await
            .unwrap();
        let result = store
            .create_edge(GraphEdge::new("e1", "a", "ghost", crate::model::EdgeType::RelatedTo, 0.5))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn search_index_document_count_accounting() {
        let index = InMemorySearchIndex::new();
        index
            .index(IndexedDoc {
                id: "d1".into(),
                content: "hello world".into(),
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        assert_eq!(index.document_count().await.unwrap(), 1);
        let hits = index
            .search("hello", &SearchQueryOpts::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d1");
    }
}
