use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::model::{EdgeType, GraphEdge};
use crate::stores::{GraphStore, SearchIndex, VectorStore};

fn default_batch_size() -> usize {
    50
}

/// One lifecycle operation the `manage` RPC can apply to a batch of
/// chunk ids (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManageOperation {
    Pin,
    Forget,
    Decay,
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageOptions {
    pub operation: ManageOperation,
    #[serde(default)]
    pub memory_ids: Vec<String>,
    /// Reserved for a future query-scoped variant; unused until a store
    /// exposes a property-filtered node scan.
    #[serde(default)]
    pub query: Option<String>,
    /// Half-life in milliseconds for `Decay`; omitted means a flat 0.9
    /// multiplier per call.
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Continue past per-id failures instead of aborting the batch.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl ManageOptions {
    pub fn new(operation: ManageOperation, memory_ids: Vec<String>) -> Self {
        Self {
            operation,
            memory_ids,
            query: None,
            ttl_ms: None,
            force: false,
            dry_run: false,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManageOutcome {
    pub id: String,
    pub applied: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageResult {
    pub operation: ManageOperation,
    pub dry_run: bool,
    pub outcomes: Vec<ManageOutcome>,
    pub affected_count: usize,
}

/// Mutates memories already persisted by [`crate::write::MemoryWriter`]
/// across the three stores (§6.2). Operates on chunk ids — the same
/// addressable unit [`crate::read::MemoryReader`] returns as
/// [`crate::read::Evidence::id`].
pub struct MemoryManager {
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    search_index: Arc<dyn SearchIndex>,
}

impl MemoryManager {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        search_index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            vector_store,
            graph_store,
            search_index,
        }
    }

    pub async fn manage(&self, mut options: ManageOptions) -> Result<ManageResult> {
        if options.memory_ids.is_empty() {
            return Err(MemoryError::InvalidInput("memory_ids must not be empty".into()));
        }
        if options.batch_size == 0 {
            options.batch_size = default_batch_size();
        }
        let ids: Vec<String> = options
            .memory_ids
            .iter()
            .take(options.batch_size)
            .cloned()
            .collect();

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in &ids {
            let outcome = match options.operation {
                ManageOperation::Pin => self.pin(id, options.dry_run).await,
                ManageOperation::Forget => self.forget(id, options.dry_run).await,
                ManageOperation::Decay => self.decay(id, options.ttl_ms, options.dry_run).await,
                ManageOperation::Merge => self.merge(id, &ids, options.dry_run).await,
            };
            match outcome {
                Ok(outcome) => outcomes.push(outcome),
                Err(_err) if options.force => outcomes.push(ManageOutcome {
                    id: id.clone(),
                    applied: false,
                    detail: format!("skipped: {_err}"),
                }),
                Err(err) => return Err(err),
            }
        }

        let affected_count = outcomes.iter().filter(|o| o.applied).count();
        Ok(ManageResult {
            operation: options.operation,
            dry_run: options.dry_run,
            outcomes,
            affected_count,
        })
    }

    async fn pin(&self, id: &str, dry_run: bool) -> Result<ManageOutcome> {
        let node = self
            .graph_store
            .get_node(id)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?;
        let Some(mut node) = node else {
            return Err(MemoryError::InvalidInput(format!("unknown memory id: {id}")));
        };
        if dry_run {
            return Ok(ManageOutcome {
                id: id.to_string(),
                applied: false,
                detail: "would pin".into(),
            });
        }
        node.properties
            .insert("pinned".into(), serde_json::Value::Bool(true));
        self.graph_store
            .create_node(node)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?;
        Ok(ManageOutcome {
            id: id.to_string(),
            applied: true,
            detail: "pinned".into(),
        })
    }

    async fn forget(&self, id: &str, dry_run: bool) -> Result<ManageOutcome> {
        if dry_run {
            return Ok(ManageOutcome {
                id: id.to_string(),
                applied: false,
                detail: "would forget".into(),
            });
        }
        self.vector_store
            .delete(id)
            .await
            .map_err(|e| MemoryError::persistence("vector", e))?;
        self.search_index
            .delete(id)
            .await
            .map_err(|e| MemoryError::persistence("search", e))?;
        self.graph_store
            .delete_node(id)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?;
        Ok(ManageOutcome {
            id: id.to_string(),
            applied: true,
            detail: "forgotten".into(),
        })
    }

    async fn decay(&self, id: &str, ttl_ms: Option<u64>, dry_run: bool) -> Result<ManageOutcome> {
        let node = self
            .graph_store
            .get_node(id)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?;
        let Some(mut node) = node else {
            return Err(MemoryError::InvalidInput(format!("unknown memory id: {id}")));
        };
        let current = node
            .properties
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
        let factor = ttl_ms
            .map(|ttl| 1.0 / (1.0 + ttl as f64 / 86_400_000.0))
            .unwrap_or(0.9);
        let decayed = (current * factor).clamp(0.0, 1.0);
        if dry_run {
            return Ok(ManageOutcome {
                id: id.to_string(),
                applied: false,
                detail: format!("would decay confidence {current:.3} -> {decayed:.3}"),
            });
        }
        node.properties
            .insert("confidence".into(), serde_json::json!(decayed));
        self.graph_store
            .create_node(node)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?;
        Ok(ManageOutcome {
            id: id.to_string(),
            applied: true,
            detail: format!("confidence {current:.3} -> {decayed:.3}"),
        })
    }

    /// Folds `id` into the batch's first member by adding a
    /// `RelatedTo` edge; the first id in the batch is the merge target
    /// and is left untouched.
    async fn merge(&self, id: &str, group: &[String], dry_run: bool) -> Result<ManageOutcome> {
        let primary = group.first().map(String::as_str).unwrap_or(id);
        if id == primary {
            return Ok(ManageOutcome {
                id: id.to_string(),
                applied: false,
                detail: "retained as merge target".into(),
            });
        }
        if dry_run {
            return Ok(ManageOutcome {
                id: id.to_string(),
                applied: false,
                detail: format!("would merge into {primary}"),
            });
        }
        if self
            .graph_store
            .get_node(id)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?
            .is_none()
        {
            return Err(MemoryError::InvalidInput(format!("unknown memory id: {id}")));
        }
        let edge = GraphEdge::new(
            format!("{id}-merged-into-{primary}"),
            id.to_string(),
            primary.to_string(),
            EdgeType::RelatedTo,
            1.0,
        );
        self.graph_store
            .create_edge(edge)
            .await
            .map_err(|e| MemoryError::persistence("graph", e))?;
        Ok(ManageOutcome {
            id: id.to_string(),
            applied: true,
            detail: format!("merged into {primary}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphNode, NodeType};
    use crate::stores::{InMemoryGraphStore, InMemorySearchIndex, InMemoryVectorStore};

    fn manager() -> MemoryManager {
        MemoryManager::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(InMemorySearchIndex::new()),
        )
    }

    #[tokio::test]
    async fn empty_memory_ids_is_rejected() {
        let manager = manager();
        let result = manager
            .manage(ManageOptions::new(ManageOperation::Pin, vec![]))
            .await;
        assert!(matches!(result, Err(MemoryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn pin_sets_the_pinned_property() {
        let manager = manager();
        manager
            .graph_store
            .create_node(GraphNode::new("c1", NodeType::ChunkNode))
            .await
            .unwrap();
        let result = manager
            .manage(ManageOptions::new(ManageOperation::Pin, vec!["c1".into()]))
            .await
            .unwrap();
        assert_eq!(result.affected_count, 1);
        let node = manager.graph_store.get_node("c1").await.unwrap().unwrap();
        assert_eq!(node.properties.get("pinned"), Some(&serde_json::Value::Bool(true)));
    }

    #[tokio::test]
    async fn dry_run_pin_does_not_mutate() {
        let manager = manager();
        manager
            .graph_store
            .create_node(GraphNode::new("c1", NodeType::ChunkNode))
            .await
            .unwrap();
        let mut opts = ManageOptions::new(ManageOperation::Pin, vec!["c1".into()]);
        opts.dry_run = true;
        let result = manager.manage(opts).await.unwrap();
        assert_eq!(result.affected_count, 0);
        let node = manager.graph_store.get_node("c1").await.unwrap().unwrap();
        assert!(node.properties.get("pinned").is_none());
    }

    #[tokio::test]
    async fn forget_removes_the_node_from_the_graph() {
        let manager = manager();
        manager
            .graph_store
            .create_node(GraphNode::new("c1", NodeType::ChunkNode))
            .await
            .unwrap();
        manager
            .manage(ManageOptions::new(ManageOperation::Forget, vec!["c1".into()]))
            .await
            .unwrap();
        assert!(manager.graph_store.get_node("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn decay_without_ttl_applies_flat_multiplier() {
        let manager = manager();
        let mut node = GraphNode::new("c1", NodeType::ChunkNode);
        node.properties.insert("confidence".into(), serde_json::json!(1.0));
        manager.graph_store.create_node(node).await.unwrap();
        manager
            .manage(ManageOptions::new(ManageOperation::Decay, vec!["c1".into()]))
            .await
            .unwrap();
        let node = manager.graph_store.get_node("c1").await.unwrap().unwrap();
        let confidence = node.properties.get("confidence").unwrap().as_f64().unwrap();
        assert!((confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_id_fails_batch_unless_forced() {
        let manager = manager();
        let result = manager
            .manage(ManageOptions::new(ManageOperation::Pin, vec!["ghost".into()]))
            .await;
        assert!(result.is_err());

        let mut opts = ManageOptions::new(ManageOperation::Pin, vec!["ghost".into()]);
        opts.force = true;
        let result = manager.manage(opts).await.unwrap();
        assert_eq!(result.affected_count, 0);
        assert!(!result.outcomes[0].applied);
    }

    #[tokio::test]
    async fn merge_links_non_primary_members_to_the_first_id() {
        let manager = manager();
        manager
            .graph_store
            .create_node(GraphNode::new("c1", NodeType::ChunkNode))
            .await
            .unwrap();
        manager
            .graph_store
            .create_node(GraphNode::new("c2", NodeType::ChunkNode))
            .await
            .unwrap();
        let result = manager
            .manage(ManageOptions::new(
                ManageOperation::Merge,
                vec!["c1".into(), "c2".into()],
            ))
            .await
            .unwrap();
        assert_eq!(result.affected_count, 1);
        let edges = manager
            .graph_store
            .neighbors("c2", &crate::stores::NeighborQuery::default())
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "c1");
    }
}
