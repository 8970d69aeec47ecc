use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;
use crate::fuse::FusedResult;
use crate::model::{clamp01, Metadata};

const AUTHORITY_MARKERS: [&str; 4] = ["official", "verified", "academic", "government"];

/// Caller-supplied personalization signals (§4.12's "Personalization").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Per-request ranking context threaded through every sub-score.
#[derive(Debug, Clone)]
pub struct RankingContext {
    pub query: String,
    pub user_id: Option<String>,
    pub user_preferences: Option<UserPreferences>,
    /// Reference instant for freshness scoring; defaults to the wall
    /// clock at rank time when absent.
    pub time_context: Option<DateTime<Utc>>,
    pub domain_context: Option<String>,
}

impl RankingContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: None,
            user_preferences: None,
            time_context: None,
            domain_context: None,
        }
    }
}

/// A fused result after scoring, with every sub-score preserved for the
/// response envelope (§4.12).
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub source_methods: Vec<String>,
    pub base_score: f64,
    pub relevance: f64,
    pub freshness: f64,
    pub authority: f64,
    pub quality: f64,
    pub diversity: f64,
    pub personalization: f64,
    pub final_score: f64,
    pub boosts_applied: Vec<String>,
    pub rank: usize,
}

/// Multi-factor re-ranker producing the final ordered envelope (§4.12).
pub struct ResultRanker {
    config: RankingConfig,
}

impl ResultRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn rank(&self, mut results: Vec<FusedResult>, ctx: &RankingContext) -> Vec<RankedResult> {
        let cap = self.config.max_results;
        if results.len() > cap.saturating_mul(2) {
            results.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
            results.truncate(cap.saturating_mul(2));
        }

        let now = ctx.time_context.unwrap_or_else(Utc::now);
        let diversity = self.diversity_scores(&results);

        let mut ranked: Vec<RankedResult> = results
            .into_iter()
            .zip(diversity)
            .map(|(r, d)| self.score_one(r, ctx, now, d))
            .collect();

        ranked.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.base_score.partial_cmp(&a.base_score).unwrap_or(Ordering::Equal))
                .then_with(|| b.relevance.partial_cmp(&a.relevance).unwrap_or(Ordering::Equal))
        });
        ranked.truncate(cap);
        for (i, r) in ranked.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        ranked
    }

    fn score_one(&self, r: FusedResult, ctx: &RankingContext, now: DateTime<Utc>, diversity: f64) -> RankedResult {
        let relevance = relevance_score(clamp01(r.combined_score), &ctx.query, &r.content, &r.metadata);
        let freshness = freshness_score(&r.metadata, now);
        let authority = authority_score(&r.metadata);
        let quality = quality_score(&r.content, &r.metadata);
        let personalization = personalization_score(&r.content, &r.metadata, ctx.user_preferences.as_ref());

        let c = &self.config;
        let total_weight = c.weight_relevance
            + c.weight_freshness
            + c.weight_authority
            + c.weight_diversity
            + c.weight_quality
            + c.weight_personalization;
        let weighted_sum = relevance * c.weight_relevance
            + freshness * c.weight_freshness
            + authority * c.weight_authority
            + diversity * c.weight_diversity
            + quality * c.weight_quality
            + personalization * c.weight_personalization;
        let mut final_score = if total_weight > 0.0 { weighted_sum / total_weight } else { 0.0 };

        let mut boosts_applied = Vec::new();
        if final_score >= 0.8 {
            final_score *= 1.1;
            boosts_applied.push("high_score_boost".to_string());
        }
        if authority >= 0.8 {
            final_score *= 1.05;
            boosts_applied.push("authority_boost".to_string());
        }
        if freshness >= 0.9 {
            final_score *= 1.03;
            boosts_applied.push("freshness_boost".to_string());
        }
        if final_score <= 0.3 {
            final_score *= 0.9;
            boosts_applied.push("low_score_penalty".to_string());
        }
        if quality <= 0.3 {
            final_score *= 0.95;
            boosts_applied.push("quality_penalty".to_string());
        }
        final_score = clamp01(final_score);

        RankedResult {
            id: r.id,
            content: r.content,
            metadata: r.metadata,
            source_methods: r.source_methods,
            base_score: r.combined_score,
            relevance,
            freshness,
            authority,
            quality,
            diversity,
            personalization,
            final_score,
            boosts_applied,
            rank: 0,
        }
    }

    /// Pairwise Jaccard (tokens ≥3 chars) over the whole candidate set;
    /// penalises near-duplicate content relative to both its closest
    /// neighbour and the corpus average (§4.12's "Diversity").
    fn diversity_scores(&self, results: &[FusedResult]) -> Vec<f64> {
        let n = results.len();
        let token_sets: Vec<HashSet<String>> = results.iter().map(|r| diversity_tokens(&r.content)).collect();

        let mut sims = vec![vec![0.0_f64; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = jaccard(&token_sets[i], &token_sets[j]);
                sims[i][j] = sim;
                sims[j][i] = sim;
            }
        }

        (0..n)
            .map(|i| {
                let mut score = 1.0_f64;
                let mut sum = 0.0_f64;
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let sim = sims[i][j];
                    sum += sim;
                    if sim > self.config.diversity_radius {
                        score *= 1.0 - 0.5 * sim;
                    }
                }
                let avg_sim = if n > 1 { sum / (n - 1) as f64 } else { 0.0 };
                score *= 1.0 - 0.3 * avg_sim;
                clamp01(score)
            })
            .collect()
    }
}

fn relevance_score(base: f64, query: &str, content: &str, metadata: &Metadata) -> f64 {
    let q = query.trim().to_lowercase();
    let mut score = base;
    if !q.is_empty() && content.to_lowercase().contains(&q) {
        score *= 1.2;
    }
    let title_hit = metadata
        .get("title")
        .and_then(|v| v.as_str())
        .is_some_and(|t| !q.is_empty() && t.to_lowercase().contains(&q));
    if title_hit {
        score *= 1.3;
    }
    clamp01(score)
}

fn freshness_score(metadata: &Metadata, now: DateTime<Utc>) -> f64 {
    let timestamp = metadata
        .get("chunk_timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    match timestamp {
        None => 0.5,
        Some(t) if t.timestamp() == 0 => 0.5,
        Some(t) => {
            let age_days = ((now - t).num_seconds() as f64 / 86400.0).max(0.0);
            clamp01((-std::f64::consts::LN_2 * age_days / 30.0).exp())
        }
    }
}

fn authority_score(metadata: &Metadata) -> f64 {
    let mut score = metadata.get("authority_score").and_then(|v| v.as_f64()).unwrap_or(0.5);
    let source = metadata.get("source").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
    if AUTHORITY_MARKERS.iter().any(|marker| source.contains(marker)) {
        score = (score * 1.2).min(1.0);
    }
    clamp01(score)
}

fn quality_score(content: &str, metadata: &Metadata) -> f64 {
    let len = content.len();
    let mut score = 0.5;
    if len > 100 && len < 2000 {
        score += 0.2;
    }
    if len < 50 {
        score -= 0.2;
    }
    if let Some(q) = metadata.get("quality_score").and_then(|v| v.as_f64()) {
        score = (score + q) / 2.0;
    }
    if len < 20 {
        score *= 0.5;
    }
    if len > 5000 {
        score *= 0.8;
    }
    clamp01(score)
}

fn personalization_score(content: &str, metadata: &Metadata, prefs: Option<&UserPreferences>) -> f64 {
    let mut score = 0.5;
    if let Some(prefs) = prefs {
        let content_lower = content.to_lowercase();
        for topic in &prefs.topics {
            if !topic.is_empty() && content_lower.contains(&topic.to_lowercase()) {
                score += 0.2;
            }
        }
        let source = metadata.get("source").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
        for preferred_source in &prefs.sources {
            if !preferred_source.is_empty() && source.contains(&preferred_source.to_lowercase()) {
                score += 0.3;
            }
        }
    }
    clamp01(score)
}

fn diversity_tokens(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 { 0.0 } else { intersection / union }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fused(id: &str, content: &str, combined_score: f64) -> FusedResult {
        FusedResult {
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            combined_score,
            source_methods: vec!["vector".into()],
            method_scores: HashMap::new(),
        }
    }

    #[test]
    fn final_scores_are_in_unit_interval_and_ranks_are_contiguous() {
        let ranker = ResultRanker::new(RankingConfig::default());
        let ctx = RankingContext::new("rust memory safety");
        let results = vec![
            fused("a", "Rust guarantees memory safety without garbage collection.", 0.9),
            fused("b", "Python favors developer ergonomics over raw throughput.", 0.4),
            fused("c", "Rust's borrow checker enforces memory safety at compile time.", 0.7),
        ];
        let ranked = ranker.rank(results, &ctx);
        assert_eq!(ranked.len(), 3);
        for (i, r) in ranked.iter().enumerate() {
            assert!((0.0..=1.0).contains(&r.final_score));
            assert_eq!(r.rank, i + 1);
        }
    }

    #[test]
    fn higher_base_score_outranks_lower_all_else_equal() {
        let ranker = ResultRanker::new(RankingConfig::default());
        let ctx = RankingContext::new("widgets");
        let results = vec![fused("low", "widgets are small", 0.1), fused("high", "widgets are small", 0.9)];
        let ranked = ranker.rank(results, &ctx);
        assert_eq!(ranked[0].id, "high");
    }

    #[test]
    fn near_duplicate_content_lowers_diversity_score() {
        let ranker = ResultRanker::new(RankingConfig::default());
        let ctx = RankingContext::new("quarterly revenue report");
        let results = vec![
            fused("a", "the quarterly revenue report exceeded expectations this year", 0.8),
            fused("b", "the quarterly revenue report exceeded expectations last year", 0.8),
            fused("c", "a completely unrelated passage about gardening techniques", 0.8),
        ];
        let ranked = ranker.rank(results, &ctx);
        let near_dup = ranked.iter().find(|r| r.id == "a" || r.id == "b").unwrap();
        let unique = ranked.iter().find(|r| r.id == "c").unwrap();
        assert!(near_dup.diversity < unique.diversity);
    }

    #[test]
    fn personalization_rewards_matching_topic() {
        let ranker = ResultRanker::new(RankingConfig::default());
        let mut ctx = RankingContext::new("machine learning");
        ctx.user_preferences = Some(UserPreferences {
            topics: vec!["machine learning".into()],
            sources: vec![],
        });
        let results = vec![fused("a", "an introduction to machine learning basics", 0.5)];
        let ranked = ranker.rank(results, &ctx);
        assert!(ranked[0].personalization > 0.5);
    }

    #[test]
    fn authority_marker_in_source_boosts_authority_and_final_score() {
        let ranker = ResultRanker::new(RankingConfig::default());
        let ctx = RankingContext::new("policy");
        let mut official = fused("official", "national policy announcement text", 0.6);
        official.metadata.insert("source".into(), serde_json::json!("official government bulletin"));
        let plain = fused("plain", "national policy announcement text", 0.6);
        let ranked = ranker.rank(vec![official, plain], &ctx);
        let official_result = ranked.iter().find(|r| r.id == "official").unwrap();
        let plain_result = ranked.iter().find(|r| r.id == "plain").unwrap();
        assert!(official_result.authority > plain_result.authority);
    }

    #[test]
    fn truncates_to_max_results_after_double_cap_prefilter() {
        let mut config = RankingConfig::default();
        config.max_results = 2;
        let ranker = ResultRanker::new(config);
        let ctx = RankingContext::new("item");
        let results: Vec<FusedResult> = (0..10).map(|i| fused(&format!("d{i}"), "an item description", i as f64 / 10.0)).collect();
        let ranked = ranker.rank(results, &ctx);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }
}
