use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ContentProcessorConfig, EntityResolverConfig, MemoryWriterConfig};
use crate::embed::Embedder;
use crate::error::{MemoryError, Result};
use crate::extract::{ClaimExtractor, EntityExtractor};
use crate::model::{EdgeType, GraphEdge, GraphNode, Metadata, NodeType, ProvenanceRecord};
use crate::process::ContentProcessor;
use crate::resolve::EntityResolver;
use crate::stores::{GraphStore, IndexedDoc, SearchIndex, VectorStore};

/// Caller-supplied write metadata (§4.5, §6.2's `WriteMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteMetadata {
    pub source: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub require_evidence: bool,
    /// Supplied by a caller retrying a prior write so chunk ids are
    /// rederived deterministically (§4.5's idempotence decision, §9).
    #[serde(default)]
    pub memory_id: Option<String>,
}

fn default_confidence() -> f64 {
    0.8
}

impl Default for WriteMetadata {
    fn default() -> Self {
        Self {
            source: String::new(),
            timestamp: None,
            user_id: None,
            tags: Vec::new(),
            confidence: default_confidence(),
            require_evidence: false,
            memory_id: None,
        }
    }
}

/// Output of [`MemoryWriter::write`] (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub memory_id: String,
    pub candidate_count: usize,
    /// Always `0` at write time — conflict detection is a read-path
    /// concern specified under §4.13, not computed during ingestion.
    pub conflicts_found: usize,
    pub entities_linked: Vec<String>,
    pub provenance_id: String,
}

/// Orchestrates the write path: chunk + extract (C4), resolve entities
/// (C5), persist across all three stores, record provenance (§4.5, C6).
pub struct MemoryWriter {
    processor: ContentProcessor,
    resolver: EntityResolver,
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    search_index: Arc<dyn SearchIndex>,
    min_confidence: f64,
}

impl MemoryWriter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        writer_config: MemoryWriterConfig,
        processor_config: ContentProcessorConfig,
        resolver_config: EntityResolverConfig,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        search_index: Arc<dyn SearchIndex>,
    ) -> Result<Self> {
        let processor = ContentProcessor::new(
            processor_config,
            embedder,
            EntityExtractor::new(Default::default()),
            ClaimExtractor::new(Default::default()),
        )?;
        let resolver = EntityResolver::new(resolver_config, search_index.clone());
        Ok(Self {
            processor,
            resolver,
            vector_store,
            graph_store,
            search_index,
            min_confidence: writer_config.min_confidence,
        })
    }

    pub async fn write(&self, content: &str, metadata: WriteMetadata) -> Result<WriteResult> {
        let memory_id = metadata.memory_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

        let processed = self
            .processor
            .process(content, &metadata.source, metadata.confidence)
            .await?;

        let mut accepted: Vec<_> = processed
            .chunks
            .into_iter()
            .filter(|c| c.confidence >= self.min_confidence)
            .collect();

        if accepted.is_empty() {
            return Err(MemoryError::ContentRejected("no valid chunks".into()));
        }

        if metadata.require_evidence {
            let missing_evidence = accepted
                .iter()
                .flat_map(|c| c.claims.iter())
                .any(|claim| claim.evidence.is_empty());
            if missing_evidence {
                return Err(MemoryError::EvidenceRequired);
            }
        }

        // Rederive chunk ids deterministically against memory_id so a
        // retried write with the same memory_id converges rather than
        // duplicating entries (§4.5, §9's idempotence decision).
        for (i, chunk) in accepted.iter_mut().enumerate() {
            chunk.id = format!("{memory_id}-chunk-{i}");
        }

        let mut entities_linked = Vec::new();
        let mut base_metadata = Metadata::new();
        base_metadata.insert("source".into(), serde_json::json!(metadata.source));
        if let Some(user_id) = &metadata.user_id {
            base_metadata.insert("user_id".into(), serde_json::json!(user_id));
        }
        base_metadata.insert("tags".into(), serde_json::json!(metadata.tags));

        for chunk in accepted.iter_mut() {
            let resolved = self.resolver.resolve(std::mem::take(&mut chunk.entities)).await?;
            chunk.entities = resolved.entities;
            entities_linked.extend(chunk.entities.iter().map(|e| e.id.clone()));

            let embedding = chunk.embedding.clone().unwrap_or_default();
            let mut doc_metadata = base_metadata.clone();
            doc_metadata.insert("chunk_timestamp".into(), serde_json::json!(chunk.timestamp.to_rfc3339()));
            doc_metadata.insert("confidence".into(), serde_json::json!(chunk.confidence));
            // VectorStore has no dedicated content column; carry it in
            // metadata so VectorSearcher can populate VectorResult.content.
            doc_metadata.insert("content".into(), serde_json::json!(chunk.content));

            let already_indexed = self
                .search_index
                .contains(&chunk.id)
                .await
                .map_err(|e| MemoryError::persistence("search_index", e))?;

            let vector_fut = self.vector_store.upsert(&chunk.id, embedding, doc_metadata.clone());
            let search_fut = async {
                if already_indexed {
                    self.search_index
                        .update(IndexedDoc {
                            id: chunk.id.clone(),
                            content: chunk.content.clone(),
                            metadata: doc_metadata.clone(),
                        })
                        .await
                } else {
                    self.search_index
                        .index(IndexedDoc {
                            id: chunk.id.clone(),
                            content: chunk.content.clone(),
                            metadata: doc_metadata.clone(),
                        })
                        .await
                }
            };
            let graph_fut = self.persist_graph(chunk, &resolved.links);

            let (vector_res, search_res, graph_res) = tokio::join!(vector_fut, search_fut, graph_fut);
            vector_res.map_err(|e| MemoryError::persistence("vector_store", e))?;
            search_res.map_err(|e| MemoryError::persistence("search_index", e))?;
            graph_res?;
        }

        let provenance = ProvenanceRecord::new(memory_id.clone(), metadata.source.clone(), metadata.user_id.clone(), content);
        self.persist_provenance(&provenance, &accepted).await?;

        Ok(WriteResult {
            memory_id,
            candidate_count: accepted.len(),
            conflicts_found: 0,
            entities_linked,
            provenance_id: provenance.id,
        })
    }

    async fn persist_graph(
        &self,
        chunk: &crate::model::Chunk,
        links: &[crate::resolve::EntityLink],
    ) -> Result<()> {
        self.graph_store
            .create_node(GraphNode::new(chunk.id.clone(), NodeType::ChunkNode))
            .await
            .map_err(|e| MemoryError::persistence("graph_store", e))?;

        for entity in &chunk.entities {
            let mut node = GraphNode::new(entity.id.clone(), NodeType::EntityNode);
            node.properties.insert("name".into(), serde_json::json!(entity.name));
            node.properties.insert("type".into(), serde_json::json!(entity.entity_type.to_string()));
            node.properties.insert("source".into(), serde_json::json!(entity.source));
            self.graph_store
                .create_node(node)
                .await
                .map_err(|e| MemoryError::persistence("graph_store", e))?;
            self.graph_store
                .create_edge(GraphEdge::new(
                    Uuid::new_v4().to_string(),
                    chunk.id.clone(),
                    entity.id.clone(),
                    EdgeType::Mentions,
                    entity.confidence,
                ))
                .await
                .map_err(|e| MemoryError::persistence("graph_store", e))?;
        }

        for claim in &chunk.claims {
            let mut node = GraphNode::new(claim.id.clone(), NodeType::ClaimNode);
            node.properties.insert("subject".into(), serde_json::json!(claim.subject));
            node.properties.insert("predicate".into(), serde_json::json!(claim.predicate));
            node.properties.insert("object".into(), serde_json::json!(claim.object));
            node.properties.insert("chunk_id".into(), serde_json::json!(chunk.id));
            self.graph_store
                .create_node(node)
                .await
                .map_err(|e| MemoryError::persistence("graph_store", e))?;
            self.graph_store
                .create_edge(GraphEdge::new(
                    Uuid::new_v4().to_string(),
                    chunk.id.clone(),
                    claim.id.clone(),
                    EdgeType::Supports,
                    claim.confidence,
                ))
                .await
                .map_err(|e| MemoryError::persistence("graph_store", e))?;
        }

        for link in links {
            self.graph_store
                .create_edge(GraphEdge::new(
                    Uuid::new_v4().to_string(),
                    link.existing_id.clone(),
                    link.new_id.clone(),
                    EdgeType::RelatedTo,
                    link.similarity,
                ))
                .await
                .map_err(|e| MemoryError::persistence("graph_store", e))?;
        }

        Ok(())
    }

    async fn persist_provenance(
        &self,
        provenance: &ProvenanceRecord,
        chunks: &[crate::model::Chunk],
    ) -> Result<()> {
        let mut properties = Metadata::new();
        properties.insert("memory_id".into(), serde_json::json!(provenance.memory_id));
        properties.insert("source".into(), serde_json::json!(provenance.source));
        properties.insert("timestamp".into(), serde_json::json!(provenance.timestamp.to_rfc3339()));
        properties.insert("version".into(), serde_json::json!(provenance.version));
        properties.insert("content_hash".into(), serde_json::json!(provenance.content_hash));

        let mut node = GraphNode::new(provenance.id.clone(), NodeType::ProvenanceNode);
        node.properties = properties;
        self.graph_store
            .create_node(node)
            .await
            .map_err(|e| MemoryError::persistence("graph_store", e))?;

        for chunk in chunks {
            self.graph_store
                .create_edge(GraphEdge::new(
                    Uuid::new_v4().to_string(),
                    provenance.id.clone(),
                    chunk.id.clone(),
                    EdgeType::Supports,
                    1.0,
                ))
                .await
                .map_err(|e| MemoryError::persistence("graph_store", e))?;
        }
        Ok(())
    }
}
