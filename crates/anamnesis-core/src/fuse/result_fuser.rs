use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::FusionConfig;
use crate::error::{MemoryError, Result};
use crate::model::Metadata;

/// A single retriever's hit, already rank-assigned by its searcher.
#[derive(Debug, Clone)]
pub struct FusionItem {
    pub id: String,
    pub content: String,
    pub score: f64,
    /// 1-based rank within this method's result list.
    pub rank: usize,
    pub metadata: Metadata,
}

/// One retrieval method's contribution to a fusion call.
#[derive(Debug, Clone)]
pub struct FusionInput {
    pub method: String,
    pub weight: f64,
    pub results: Vec<FusionItem>,
}

/// A document after RRF + weighted blend, before ranking (§4.12 input).
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub combined_score: f64,
    pub source_methods: Vec<String>,
    pub method_scores: HashMap<String, f64>,
}

/// Per-call fusion diagnostics surfaced in the response envelope.
#[derive(Debug, Clone)]
pub struct FusionStats {
    pub input_methods: Vec<String>,
    pub method_counts: HashMap<String, usize>,
    pub normalized_scores: bool,
}

/// Reciprocal rank fusion plus a weighted-average score blend (§4.11).
pub struct ResultFuser {
    config: FusionConfig,
}

impl ResultFuser {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn fuse(&self, inputs: Vec<FusionInput>) -> Result<(Vec<FusedResult>, FusionStats)> {
        for input in &inputs {
            if input.method.trim().is_empty() {
                return Err(MemoryError::InvalidInput("fusion input missing method name".into()));
            }
        }

        let total_weight: f64 = inputs.iter().map(|i| i.weight).sum();
        let method_counts: HashMap<String, usize> = inputs.iter().map(|i| (i.method.clone(), i.results.len())).collect();
        let method_names: Vec<String> = inputs.iter().map(|i| i.method.clone()).collect();
        let weight_by_method: HashMap<String, f64> = inputs.iter().map(|i| (i.method.clone(), i.weight)).collect();

        let normalized = if self.config.normalize_scores {
            normalize(inputs)
        } else {
            inputs
        };

        struct Acc {
            content: String,
            metadata: Metadata,
            rrf: f64,
            methods: HashSet<String>,
            method_scores: HashMap<String, f64>,
        }

        let mut acc: HashMap<String, Acc> = HashMap::new();
        for input in &normalized {
            for item in &input.results {
                let entry = acc.entry(item.id.clone()).or_insert_with(|| Acc {
                    content: String::new(),
                    metadata: Metadata::new(),
                    rrf: 0.0,
                    methods: HashSet::new(),
                    method_scores: HashMap::new(),
                });
                entry.rrf += 1.0 / (self.config.rrf_k + item.rank as f64);
                entry.methods.insert(input.method.clone());
                entry.method_scores.insert(input.method.clone(), item.score);
                if entry.content.is_empty() {
                    entry.content = item.content.clone();
                    entry.metadata = item.metadata.clone();
                }
            }
        }

        let mut fused: Vec<FusedResult> = acc
            .into_iter()
            .map(|(id, a)| {
                let weighted_sum: f64 = method_names
                    .iter()
                    .map(|m| {
                        let score = *a.method_scores.get(m).unwrap_or(&0.0);
                        let weight = *weight_by_method.get(m).unwrap_or(&0.0);
                        score * weight
                    })
                    .sum();
                let weighted_avg = if total_weight > 0.0 { weighted_sum / total_weight } else { 0.0 };
                let combined = a.rrf * (1.0 + weighted_avg);
                FusedResult {
                    id,
                    content: a.content,
                    metadata: a.metadata,
                    combined_score: combined,
                    source_methods: a.methods.into_iter().collect(),
                    method_scores: a.method_scores,
                }
            })
            .collect();

        fused.retain(|r| r.combined_score >= self.config.min_score);
        fused.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
        fused.truncate(self.config.max_results);

        let stats = FusionStats {
            input_methods: method_names,
            method_counts,
            normalized_scores: self.config.normalize_scores,
        };

        Ok((fused, stats))
    }
}

fn normalize(inputs: Vec<FusionInput>) -> Vec<FusionInput> {
    inputs
        .into_iter()
        .map(|mut input| {
            let max = input.results.iter().map(|r| r.score).fold(0.0_f64, f64::max);
            if max > 0.0 {
                for item in input.results.iter_mut() {
                    item.score = (item.score / max).clamp(0.0, 1.0);
                }
            }
            input
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, score: f64, rank: usize) -> FusionItem {
        FusionItem {
            id: id.into(),
            content: format!("content for {id}"),
            score,
            rank,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn empty_method_name_is_rejected() {
        let fuser = ResultFuser::new(FusionConfig::default());
        let result = fuser.fuse(vec![FusionInput {
            method: "".into(),
            weight: 1.0,
            results: vec![],
        }]);
        assert!(matches!(result, Err(MemoryError::InvalidInput(_))));
    }

    #[test]
    fn doc_in_both_methods_outranks_doc_in_one() {
        let fuser = ResultFuser::new(FusionConfig::default());
        let (fused, _stats) = fuser
            .fuse(vec![
                FusionInput {
                    method: "vector".into(),
                    weight: 1.0,
                    results: vec![item("a", 0.9, 1), item("b", 0.5, 2)],
                },
                FusionInput {
                    method: "keyword".into(),
                    weight: 1.0,
                    results: vec![item("a", 0.8, 1)],
                },
            ])
            .unwrap();
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[0].source_methods.len(), 2);
    }

    #[test]
    fn results_below_min_score_are_dropped() {
        let mut config = FusionConfig::default();
        config.min_score = 1.0;
        let fuser = ResultFuser::new(config);
        let (fused, _stats) = fuser
            .fuse(vec![FusionInput {
                method: "vector".into(),
                weight: 1.0,
                results: vec![item("a", 0.1, 1)],
            }])
            .unwrap();
        assert!(fused.is_empty());
    }
}
