use async_trait::async_trait;
use thiserror::Error;

use crate::model::{EdgeType, GraphEdge, GraphNode};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphStoreError {
    #[error("graph store connection error: {0}")]
    Connection(String),
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("edge endpoint not found: {0}")]
    DanglingEdge(String),
}

/// Traversal direction for [`GraphStore::neighbors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Filter options for a single hop of [`GraphStore::neighbors`] (§6.1).
#[derive(Debug, Clone, Default)]
pub struct NeighborQuery {
    pub edge_types: Option<Vec<EdgeType>>,
    pub direction: Option<Direction>,
    pub min_weight: Option<f64>,
}

/// Labelled, directed property-graph contract (§6.1). Multigraph: more
/// than one edge of different types may connect the same ordered pair.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn create_node(&self, node: GraphNode) -> Result<(), GraphStoreError>;

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>, GraphStoreError>;

    /// Creates an edge, deduping on `(from, to, type)` as §7 requires so
    /// that a retried write cannot duplicate mention/support edges.
    async fn create_edge(&self, edge: GraphEdge) -> Result<(), GraphStoreError>;

    async fn neighbors(
        &self,
        id: &str,
        query: &NeighborQuery,
    ) -> Result<Vec<GraphEdge>, GraphStoreError>;

    async fn delete_node(&self, id: &str) -> Result<(), GraphStoreError>;

    async fn health(&self) -> Result<(), GraphStoreError>;
}
