use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::AnamnesisConfig;
use crate::embed::Embedder;
use crate::error::{MemoryError, Result};
use crate::extract::EntityExtractor;
use crate::fuse::{FusionInput, FusionItem, ResultFuser};
use crate::model::{EdgeType, Metadata, NodeType};
use crate::query::{QueryExpander, QueryProcessor};
use crate::rank::{RankedResult, RankingContext, ResultRanker, UserPreferences};
use crate::search::{GraphSearcher, KeywordSearcher, VectorSearcher};
use crate::stores::{Direction, GraphStore, NeighborQuery, SearchIndex, VectorStore};

fn default_max_results() -> usize {
    10
}

fn default_time_budget_ms() -> u64 {
    5_000
}

fn default_include_graph() -> bool {
    true
}

/// Caller-supplied recall request (§6.2's `RecallArgs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallArgs {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
    #[serde(default)]
    pub filters: Metadata,
    #[serde(default = "default_include_graph")]
    pub include_graph: bool,
    #[serde(default)]
    pub min_confidence: f64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_preferences: Option<UserPreferences>,
}

impl RecallArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: default_max_results(),
            time_budget_ms: default_time_budget_ms(),
            filters: Metadata::new(),
            include_graph: default_include_graph(),
            min_confidence: 0.0,
            user_id: None,
            user_preferences: None,
        }
    }
}

/// One recalled chunk plus its write-time and rank-time scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: String,
    pub content: String,
    /// The `WriteMetadata.confidence` this chunk was written with, read
    /// back from store metadata; falls back to the rank score if a
    /// backend never carried it through.
    pub confidence: f64,
    pub score: f64,
    pub rank: usize,
    pub source: String,
    pub memory_id: Option<String>,
    pub provenance_id: Option<String>,
    pub metadata: Metadata,
}

/// A cluster of recalled evidence sharing a mentioned entity (§4.13's
/// `community_cards`, left unelaborated by the distilled contract — see
/// the grounding ledger for the scoping decision).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityCard {
    pub label: String,
    pub memory_ids: Vec<String>,
}

/// A detected disagreement between two persisted artefacts covering the
/// same subject (§4.13 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub conflict_type: String,
    pub description: String,
    pub conflicting_ids: Vec<String>,
    pub severity: f64,
}

/// Per-call retrieval diagnostics (§4.13 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalStats {
    pub query_time_ms: u64,
    pub vector_results: usize,
    pub graph_results: usize,
    pub search_results: usize,
    pub fusion_score: f64,
    pub total_candidates: usize,
    /// Set when the time budget expired before every retriever
    /// finished; never a hang, never a bare error (§8).
    pub partial: bool,
}

/// Output of [`MemoryReader::recall`] (§4.13).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    pub evidence: Vec<Evidence>,
    pub community_cards: Vec<CommunityCard>,
    pub conflicts: Vec<ConflictInfo>,
    pub retrieval_stats: RetrievalStats,
    pub self_critique: Option<String>,
}

struct FanoutOutcome {
    vector: Vec<FusionItem>,
    keyword: Vec<FusionItem>,
    graph: Vec<FusionItem>,
    graph_invoked: bool,
    partial: bool,
}

/// Orchestrates the read path: parse+expand (C7/C8), concurrent
/// retrieval (C9-C11), fusion (C12... wait, see [`crate::fuse`]) and
/// ranking (C13), plus provenance lookup and conflict surfacing
/// (§4.13).
pub struct MemoryReader {
    query_processor: QueryProcessor,
    embedder: Arc<dyn Embedder>,
    vector_searcher: VectorSearcher,
    keyword_searcher: KeywordSearcher,
    graph_searcher: GraphSearcher,
    fuser: ResultFuser,
    ranking_template: crate::config::RankingConfig,
    graph_store: Arc<dyn GraphStore>,
}

impl MemoryReader {
    pub fn new(
        config: AnamnesisConfig,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        search_index: Arc<dyn SearchIndex>,
    ) -> Self {
        let expander = QueryExpander::new(config.query_expander);
        let query_processor = QueryProcessor::new(config.query_processor, expander);
        let vector_searcher = VectorSearcher::new(vector_store);
        let keyword_searcher = KeywordSearcher::new(config.keyword_searcher, search_index.clone());
        let graph_searcher = GraphSearcher::new(
            config.graph_searcher,
            graph_store.clone(),
            search_index,
            EntityExtractor::new(config.entity_extractor),
        );
        let fuser = ResultFuser::new(config.fusion);

        Self {
            query_processor,
            embedder,
            vector_searcher,
            keyword_searcher,
            graph_searcher,
            fuser,
            ranking_template: config.ranking,
            graph_store,
        }
    }

    pub async fn recall(&self, args: RecallArgs) -> Result<RecallResult> {
        let started = Instant::now();
        let args = self.sanitize(args)?;
        let time_budget = Duration::from_millis(args.time_budget_ms.max(1));

        let processed = self.query_processor.process(&args.query)?;
        let embedding = self
            .embedder
            .embed(&args.query)
            .await
            .map_err(|e| MemoryError::persistence("embedder", e))?;

        let k = args.max_results.saturating_mul(2).max(1);
        let outcome = self.fan_out(&args, &processed.expansions, &embedding, k, time_budget).await?;

        let vector_count = outcome.vector.len();
        let keyword_count = outcome.keyword.len();
        let graph_count = if outcome.graph_invoked { outcome.graph.len() } else { 0 };

        let mut candidate_ids: HashSet<String> = HashSet::new();
        candidate_ids.extend(outcome.vector.iter().map(|i| i.id.clone()));
        candidate_ids.extend(outcome.keyword.iter().map(|i| i.id.clone()));
        candidate_ids.extend(outcome.graph.iter().map(|i| i.id.clone()));
        let total_candidates = candidate_ids.len();

        let mut fusion_inputs = vec![
            FusionInput {
                method: "vector".into(),
                weight: 1.0,
                results: outcome.vector,
            },
            FusionInput {
                method: "keyword".into(),
                weight: 1.0,
                results: outcome.keyword,
            },
        ];
        if outcome.graph_invoked {
            fusion_inputs.push(FusionInput {
                method: "graph".into(),
                weight: 1.0,
                results: outcome.graph,
            });
        }

        let (fused, _fusion_stats) = self.fuser.fuse(fusion_inputs)?;
        let fusion_score = fused.first().map(|f| f.combined_score).unwrap_or(0.0);

        let mut ranking_config = self.ranking_template.clone();
        ranking_config.max_results = args.max_results;
        let ranker = ResultRanker::new(ranking_config);

        let mut ctx = RankingContext::new(args.query.clone());
        ctx.user_id = args.user_id.clone();
        ctx.user_preferences = args.user_preferences.clone();

        let mut ranked: Vec<RankedResult> = ranker.rank(fused, &ctx);
        ranked.retain(|r| r.final_score >= args.min_confidence);
        for (i, r) in ranked.iter_mut().enumerate() {
            r.rank = i + 1;
        }

        let chunk_ids: Vec<String> = ranked.iter().map(|r| r.id.clone()).collect();

        let mut evidence = Vec::with_capacity(ranked.len());
        for r in ranked {
            let provenance = self.lookup_provenance(&r.id).await;
            let confidence = r
                .metadata
                .get("confidence")
                .and_then(|v| v.as_f64())
                .unwrap_or(r.final_score);
            evidence.push(Evidence {
                id: r.id,
                content: r.content,
                confidence,
                score: r.final_score,
                rank: r.rank,
                source: r.metadata.get("source").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                memory_id: provenance.as_ref().map(|(_, memory_id)| memory_id.clone()),
                provenance_id: provenance.map(|(id, _)| id),
                metadata: r.metadata,
            });
        }

        let (conflicts, community_cards) = self.analyze_evidence_graph(&chunk_ids).await;

        let stats = RetrievalStats {
            query_time_ms: started.elapsed().as_millis() as u64,
            vector_results: vector_count,
            graph_results: graph_count,
            search_results: keyword_count,
            fusion_score,
            total_candidates,
            partial: outcome.partial,
        };

        let self_critique = self.build_self_critique(&stats, &conflicts);

        Ok(RecallResult {
            evidence,
            community_cards,
            conflicts,
            retrieval_stats: stats,
            self_critique,
        })
    }

    fn sanitize(&self, mut args: RecallArgs) -> Result<RecallArgs> {
        if args.query.trim().is_empty() {
            return Err(MemoryError::InvalidInput("query must not be empty".into()));
        }
        if args.max_results == 0 {
            args.max_results = default_max_results();
        }
        args.max_results = args.max_results.min(100);
        args.time_budget_ms = args.time_budget_ms.min(30_000);
        args.min_confidence = args.min_confidence.clamp(0.0, 1.0);
        Ok(args)
    }

    /// Concurrent fan-out over the three retrievers (§4.13 step 4, §5).
    /// When `include_graph` is false the graph branch is never spawned
    /// at all, not merely discarded (§9's resolved Open Question).
    async fn fan_out(
        &self,
        args: &RecallArgs,
        expansions: &[String],
        embedding: &[f32],
        k: usize,
        time_budget: Duration,
    ) -> Result<FanoutOutcome> {
        let mut partial = false;
        let mut any_ok = false;
        let mut first_error: Option<MemoryError> = None;

        let vector_fut = timeout(time_budget, self.vector_searcher.search(embedding, k, &args.filters));
        let keyword_fut = timeout(time_budget, self.keyword_searcher.search_multiple(expansions, &args.filters));

        let (vector, keyword, graph, graph_invoked) = if args.include_graph {
            let graph_fut = timeout(time_budget, self.graph_searcher.search(&args.query, None, None));
            let (v, kw, g) = tokio::join!(vector_fut, keyword_fut, graph_fut);
            let graph = branch_outcome(g, &mut partial, &mut any_ok, &mut first_error);
            let vector = branch_outcome(v, &mut partial, &mut any_ok, &mut first_error);
            let keyword = branch_outcome(kw, &mut partial, &mut any_ok, &mut first_error);
            (vector, keyword, graph, true)
        } else {
            let (v, kw) = tokio::join!(vector_fut, keyword_fut);
            let vector = branch_outcome(v, &mut partial, &mut any_ok, &mut first_error);
            let keyword = branch_outcome(kw, &mut partial, &mut any_ok, &mut first_error);
            (vector, keyword, Vec::new(), false)
        };

        if !any_ok {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(FanoutOutcome {
            vector,
            keyword,
            graph,
            graph_invoked,
            partial,
        })
    }

    async fn lookup_provenance(&self, chunk_id: &str) -> Option<(String, String)> {
        let query = NeighborQuery {
            edge_types: Some(vec![EdgeType::Supports]),
            direction: Some(Direction::Incoming),
            min_weight: None,
        };
        let edges = self.graph_store.neighbors(chunk_id, &query).await.ok()?;
        let provenance_edge = edges.into_iter().find(|e| e.from != chunk_id)?;
        let node = self.graph_store.get_node(&provenance_edge.from).await.ok().flatten()?;
        if node.node_type != NodeType::ProvenanceNode {
            return None;
        }
        let memory_id = node
            .properties
            .get("memory_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Some((node.id, memory_id))
    }

    /// Scoped to the recalled chunks only: groups the claims and
    /// entities each chunk mentions and flags disagreements, and
    /// clusters chunks sharing a mentioned entity into a community
    /// card (§4.13 step 7).
    async fn analyze_evidence_graph(&self, chunk_ids: &[String]) -> (Vec<ConflictInfo>, Vec<CommunityCard>) {
        let mut claim_groups: HashMap<(String, String), HashMap<String, Vec<String>>> = HashMap::new();
        let mut entity_sources: HashMap<(String, String), HashMap<String, Vec<String>>> = HashMap::new();
        let mut entity_chunks: HashMap<String, HashSet<String>> = HashMap::new();

        for chunk_id in chunk_ids {
            let query = NeighborQuery {
                edge_types: Some(vec![EdgeType::Supports, EdgeType::Mentions]),
                direction: Some(Direction::Outgoing),
                min_weight: None,
            };
            let edges = match self.graph_store.neighbors(chunk_id, &query).await {
                Ok(edges) => edges,
                Err(_) => continue,
            };
            for edge in edges {
                let Ok(Some(node)) = self.graph_store.get_node(&edge.to).await else {
                    continue;
                };
                match node.node_type {
                    NodeType::ClaimNode => {
                        let subject = node.properties.get("subject").and_then(|v| v.as_str()).unwrap_or_default().trim().to_lowercase();
                        let predicate = node.properties.get("predicate").and_then(|v| v.as_str()).unwrap_or_default().trim().to_lowercase();
                        let object = node.properties.get("object").and_then(|v| v.as_str()).unwrap_or_default().trim().to_lowercase();
                        if subject.is_empty() || predicate.is_empty() || object.is_empty() {
                            continue;
                        }
                        claim_groups
                            .entry((subject, predicate))
                            .or_default()
                            .entry(object)
                            .or_default()
                            .push(node.id.clone());
                    }
                    NodeType::EntityNode => {
                        let name = node.properties.get("name").and_then(|v| v.as_str()).unwrap_or_default().trim().to_lowercase();
                        if name.is_empty() {
                            continue;
                        }
                        let entity_type = node.properties.get("type").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        let source = node.properties.get("source").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        entity_sources
                            .entry((name.clone(), entity_type))
                            .or_default()
                            .entry(source)
                            .or_default()
                            .push(node.id.clone());
                        entity_chunks.entry(name).or_default().insert(chunk_id.clone());
                    }
                    _ => {}
                }
            }
        }

        let mut conflicts = Vec::new();
        for ((subject, predicate), by_object) in &claim_groups {
            if by_object.len() > 1 {
                conflicts.push(ConflictInfo {
                    id: Uuid::new_v4().to_string(),
                    conflict_type: "claim".into(),
                    description: format!("disagreeing objects for \"{subject} {predicate}\""),
                    conflicting_ids: by_object.values().flatten().cloned().collect(),
                    severity: clamp_severity(by_object.len()),
                });
            }
        }
        for ((name, entity_type), by_source) in &entity_sources {
            if by_source.len() > 1 {
                conflicts.push(ConflictInfo {
                    id: Uuid::new_v4().to_string(),
                    conflict_type: "entity".into(),
                    description: format!("\"{name}\" ({entity_type}) linked from disagreeing sources"),
                    conflicting_ids: by_source.values().flatten().cloned().collect(),
                    severity: clamp_severity(by_source.len()),
                });
            }
        }

        let mut community_cards: Vec<CommunityCard> = entity_chunks
            .into_iter()
            .filter(|(_, chunks)| chunks.len() > 1)
            .map(|(name, chunks)| CommunityCard {
                label: name,
                memory_ids: chunks.into_iter().collect(),
            })
            .collect();
        community_cards.sort_by(|a, b| a.label.cmp(&b.label));

        (conflicts, community_cards)
    }

    fn build_self_critique(&self, stats: &RetrievalStats, conflicts: &[ConflictInfo]) -> Option<String> {
        let mut notes = Vec::new();
        if stats.partial {
            notes.push("time budget expired before every retriever finished; results may be incomplete".to_string());
        }
        if stats.total_candidates == 0 {
            notes.push("no matching memories found for this query".to_string());
        }
        if !conflicts.is_empty() {
            notes.push(format!("{} unresolved conflict(s) among recalled evidence", conflicts.len()));
        }
        if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        }
    }
}

/// Unwraps one `timeout(...).await` outcome, folding timeouts and
/// store errors into an empty result while tracking whether the
/// request as a whole still has a usable branch (§7: isolate failures
/// per branch; fail only if every branch failed outright).
fn branch_outcome(
    outcome: std::result::Result<Result<Vec<FusionItem>>, tokio::time::error::Elapsed>,
    partial: &mut bool,
    any_ok: &mut bool,
    first_error: &mut Option<MemoryError>,
) -> Vec<FusionItem> {
    match outcome {
        Ok(Ok(items)) => {
            *any_ok = true;
            items
        }
        Ok(Err(e)) => {
            if first_error.is_none() {
                *first_error = Some(e);
            }
            Vec::new()
        }
        Err(_) => {
            *partial = true;
            *any_ok = true;
            Vec::new()
        }
    }
}

fn clamp_severity(group_count: usize) -> f64 {
    ((group_count.saturating_sub(1)) as f64 / group_count.max(1) as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::model::{EdgeType, GraphEdge, GraphNode, NodeType};
    use crate::stores::{InMemoryGraphStore, InMemorySearchIndex, InMemoryVectorStore};
    use crate::write::{MemoryWriter, WriteMetadata};

    fn reader(
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        search_index: Arc<dyn SearchIndex>,
    ) -> MemoryReader {
        MemoryReader::new(AnamnesisConfig::default(), Arc::new(HashEmbedder::new(32)), vector_store, graph_store, search_index)
    }

    async fn seeded() -> (MemoryReader, Arc<InMemoryVectorStore>, Arc<InMemoryGraphStore>, Arc<InMemorySearchIndex>) {
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let graph_store = Arc::new(InMemoryGraphStore::new());
        let search_index = Arc::new(InMemorySearchIndex::new());

        let writer = MemoryWriter::new(
            Default::default(),
            Default::default(),
            Default::default(),
            Arc::new(HashEmbedder::new(32)),
            vector_store.clone(),
            graph_store.clone(),
            search_index.clone(),
        )
        .unwrap();
        writer
            .write(
                "Dr. Smith works at Acme Inc.",
                WriteMetadata {
                    source: "s1".into(),
                    confidence: 0.9,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reader = reader(vector_store.clone(), graph_store.clone(), search_index.clone());
        (reader, vector_store, graph_store, search_index)
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (reader, ..) = seeded().await;
        let result = reader.recall(RecallArgs::new("   ")).await;
        assert!(matches!(result, Err(MemoryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn max_results_zero_defaults_to_ten() {
        let (reader, ..) = seeded().await;
        let mut args = RecallArgs::new("Smith");
        args.max_results = 0;
        let result = reader.recall(args).await.unwrap();
        assert!(result.evidence.len() <= 10);
    }

    #[tokio::test]
    async fn recall_returns_the_written_chunk() {
        let (reader, ..) = seeded().await;
        let result = reader.recall(RecallArgs::new("Smith")).await.unwrap();
        assert!(result.evidence.iter().any(|e| e.content.contains("Smith")));
        assert!(result.retrieval_stats.total_candidates >= 1);
    }

    #[tokio::test]
    async fn include_graph_false_reports_zero_graph_results() {
        let (reader, ..) = seeded().await;
        let mut args = RecallArgs::new("Smith");
        args.include_graph = false;
        let result = reader.recall(args).await.unwrap();
        assert_eq!(result.retrieval_stats.graph_results, 0);
    }

    #[tokio::test]
    async fn conflicting_claims_are_surfaced() {
        let graph_store = Arc::new(InMemoryGraphStore::new());
        let search_index = Arc::new(InMemorySearchIndex::new());
        let vector_store = Arc::new(InMemoryVectorStore::new());

        graph_store.create_node(GraphNode::new("chunk-1", NodeType::ChunkNode)).await.unwrap();
        let mut claim_a = GraphNode::new("claim-a", NodeType::ClaimNode);
        claim_a.properties.insert("subject".into(), serde_json::json!("smoking"));
        claim_a.properties.insert("predicate".into(), serde_json::json!("causes"));
        claim_a.properties.insert("object".into(), serde_json::json!("cancer"));
        graph_store.create_node(claim_a).await.unwrap();
        let mut claim_b = GraphNode::new("claim-b", NodeType::ClaimNode);
        claim_b.properties.insert("subject".into(), serde_json::json!("smoking"));
        claim_b.properties.insert("predicate".into(), serde_json::json!("causes"));
        claim_b.properties.insert("object".into(), serde_json::json!("relaxation"));
        graph_store.create_node(claim_b).await.unwrap();
        graph_store
            .create_edge(GraphEdge::new("e1", "chunk-1", "claim-a", EdgeType::Supports, 0.9))
            .await
            .unwrap();
        graph_store
            .create_edge(GraphEdge::new("e2", "chunk-1", "claim-b", EdgeType::Supports, 0.9))
            .await
            .unwrap();

        let reader = reader(vector_store, graph_store, search_index);
        let (conflicts, _cards) = reader.analyze_evidence_graph(&["chunk-1".to_string()]).await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, "claim");
    }
}
