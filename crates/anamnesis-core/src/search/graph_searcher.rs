use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::GraphSearcherConfig;
use crate::error::{MemoryError, Result};
use crate::extract::EntityExtractor;
use crate::fuse::FusionItem;
use crate::model::{EdgeType, Metadata, NodeType};
use crate::stores::{Direction, GraphStore, NeighborQuery, SearchIndex, SearchQueryOpts};

/// Bounded breadth-first traversal from query-derived seed entities
/// (§4.10, C11). Aggregates incident edge weight onto the chunk nodes
/// reached and normalises the result to `[0,1]`.
pub struct GraphSearcher {
    config: GraphSearcherConfig,
    graph_store: Arc<dyn GraphStore>,
    search_index: Arc<dyn SearchIndex>,
    entity_extractor: EntityExtractor,
}

impl GraphSearcher {
    pub fn new(
        config: GraphSearcherConfig,
        graph_store: Arc<dyn GraphStore>,
        search_index: Arc<dyn SearchIndex>,
        entity_extractor: EntityExtractor,
    ) -> Self {
        Self {
            config,
            graph_store,
            search_index,
            entity_extractor,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        edge_types: Option<Vec<EdgeType>>,
        min_weight: Option<f64>,
    ) -> Result<Vec<FusionItem>> {
        let seeds = self.seed_entities(query).await?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let neighbor_query = NeighborQuery {
            edge_types,
            direction: Some(Direction::Both),
            min_weight,
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut chunk_scores: HashMap<String, f64> = HashMap::new();
        let mut frontier: Vec<String> = seeds;

        for _ in 0..self.config.max_depth {
            if frontier.is_empty() || visited.len() >= self.config.max_nodes {
                break;
            }
            let mut next_frontier = Vec::new();
            for node_id in frontier {
                if visited.contains(&node_id) || visited.len() >= self.config.max_nodes {
                    continue;
                }
                visited.insert(node_id.clone());

                let edges = self
                    .graph_store
                    .neighbors(&node_id, &neighbor_query)
                    .await
                    .map_err(|e| MemoryError::persistence("graph_store", e))?;

                for edge in edges {
                    let other = if edge.from == node_id { edge.to.clone() } else { edge.from.clone() };
                    if visited.contains(&other) {
                        continue;
                    }
                    match self
                        .graph_store
                        .get_node(&other)
                        .await
                        .map_err(|e| MemoryError::persistence("graph_store", e))?
                    {
                        Some(node) if node.node_type == NodeType::ChunkNode => {
                            *chunk_scores.entry(other).or_insert(0.0) += edge.weight;
                        }
                        Some(_) => next_frontier.push(other),
                        None => {}
                    }
                }
            }
            frontier = next_frontier;
        }

        let max_score = chunk_scores.values().cloned().fold(0.0_f64, f64::max);
        let mut ranked: Vec<(String, f64)> = chunk_scores
            .into_iter()
            .map(|(id, score)| (id, if max_score > 0.0 { (score / max_score).clamp(0.0, 1.0) } else { 0.0 }))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, (id, score))| FusionItem {
                id,
                content: String::new(),
                score,
                rank: i + 1,
                metadata: Metadata::new(),
            })
            .collect())
    }

    async fn seed_entities(&self, query: &str) -> Result<Vec<String>> {
        let candidates = self.entity_extractor.extract(query, "query");
        let mut seeds = Vec::new();
        for entity in candidates {
            let mut filters = Metadata::new();
            filters.insert("type".into(), serde_json::json!("entity"));
            let opts = SearchQueryOpts {
                limit: 1,
                offset: 0,
                filters,
                highlight: false,
            };
            let hits = self
                .search_index
                .search(&entity.name, &opts)
                .await
                .map_err(|e| MemoryError::persistence("search_index", e))?;
            if let Some(hit) = hits.into_iter().next() {
                seeds.push(hit.id);
            }
        }
        seeds.sort();
        seeds.dedup();
        Ok(seeds)
    }
}
