use serde::{Deserialize, Serialize};

use super::Metadata;

/// The kind of thing a [`GraphNode`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[non_exhaustive]
pub enum NodeType {
    EntityNode,
    ClaimNode,
    ChunkNode,
    /// Provenance records are persisted as graph nodes, see §6.3.
    ProvenanceNode,
}

/// The typed relation carried by a [`GraphEdge`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[non_exhaustive]
pub enum EdgeType {
    RelatedTo,
    Mentions,
    Supports,
    Contradicts,
    Custom(String),
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeType::RelatedTo => write!(f, "RelatedTo"),
            EdgeType::Mentions => write!(f, "Mentions"),
            EdgeType::Supports => write!(f, "Supports"),
            EdgeType::Contradicts => write!(f, "Contradicts"),
            EdgeType::Custom(s) => write!(f, "{s}"),
        }
    }
}

/// A node in the labelled property graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GraphNode {
    pub id: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub properties: Metadata,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            properties: Metadata::new(),
        }
    }
}

/// An edge in the multigraph. Self-loops are allowed; more than one edge
/// of different types may connect the same ordered pair of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    pub weight: f64,
    #[serde(default)]
    pub properties: Metadata,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        edge_type: EdgeType,
        weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            edge_type,
            weight: weight.clamp(0.0, 1.0),
            properties: Metadata::new(),
        }
    }

    /// The dedup key backends should enforce uniqueness on when a write
    /// is retried (§7: "graph edges may duplicate — backends should
    /// dedup on `(from,to,type)`").
    pub fn dedup_key(&self) -> (String, String, String) {
        (self.from.clone(), self.to.clone(), self.edge_type.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_weight_is_clamped() {
        let e = GraphEdge::new("e1", "a", "b", EdgeType::RelatedTo, 5.0);
        assert_eq!(e.weight, 1.0);
    }

    #[test]
    fn dedup_key_ignores_id_and_weight() {
        let e1 = GraphEdge::new("e1", "a", "b", EdgeType::Mentions, 0.3);
        let e2 = GraphEdge::new("e2", "a", "b", EdgeType::Mentions, 0.9);
        assert_eq!(e1.dedup_key(), e2.dedup_key());
    }

    #[test]
    fn self_loops_are_representable() {
        let e = GraphEdge::new("e1", "a", "a", EdgeType::RelatedTo, 1.0);
        assert_eq!(e.from, e.to);
    }
}
