use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use crate::config::KeywordSearcherConfig;
use crate::error::{MemoryError, Result};
use crate::fuse::FusionItem;
use crate::model::Metadata;
use crate::stores::{SearchIndex, SearchQueryOpts};

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "of", "in", "on", "at", "to", "for", "and",
        "or", "but", "with", "by", "from", "as",
    ]
    .into_iter()
    .collect()
});

fn tokenize(text: &str, case_sensitive: bool) -> Vec<String> {
    let text = if case_sensitive { text.to_string() } else { text.to_lowercase() };
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(*t))
        .map(str::to_string)
        .collect()
}

/// BM25 scoring over the [`SearchIndex`] contract (§4.9, C10).
pub struct KeywordSearcher {
    config: KeywordSearcherConfig,
    index: Arc<dyn SearchIndex>,
}

impl KeywordSearcher {
    pub fn new(config: KeywordSearcherConfig, index: Arc<dyn SearchIndex>) -> Self {
        Self { config, index }
    }

    pub async fn search(&self, query: &str, filters: &Metadata) -> Result<Vec<FusionItem>> {
        self.search_multiple(std::slice::from_ref(&query.to_string()), filters).await
    }

    /// Runs BM25 per expansion and merges by summing contributions per
    /// doc id (§4.13's "merge via its SearchMultiple semantics").
    pub async fn search_multiple(&self, queries: &[String], filters: &Metadata) -> Result<Vec<FusionItem>> {
        let n = self
            .index
            .document_count()
            .await
            .map_err(|e| MemoryError::persistence("search_index", e))?
            .max(1);
        let total_size = self
            .index
            .index_size()
            .await
            .map_err(|e| MemoryError::persistence("search_index", e))?;
        let avg_dl = (total_size as f64 / n as f64).max(1.0);
        let assumed_n = self.config.assumed_corpus_size.max(n);

        let mut merged: HashMap<String, (f64, usize, String, Metadata)> = HashMap::new();

        for query in queries {
            let query_tokens = tokenize(query, self.config.case_sensitive);
            if query_tokens.is_empty() {
                continue;
            }
            let opts = SearchQueryOpts {
                limit: 0,
                offset: 0,
                filters: filters.clone(),
                highlight: false,
            };
            let candidates = self
                .index
                .search(query, &opts)
                .await
                .map_err(|e| MemoryError::persistence("search_index", e))?;

            for candidate in candidates {
                let doc_tokens = tokenize(&candidate.content, self.config.case_sensitive);
                let doc_len = doc_tokens.len().max(1) as f64;
                let mut doc_tf: HashMap<&str, usize> = HashMap::new();
                for t in &doc_tokens {
                    *doc_tf.entry(t.as_str()).or_insert(0) += 1;
                }

                let mut bm25 = 0.0;
                let mut matched_terms = 0usize;
                let unique_terms: HashSet<&String> = query_tokens.iter().collect();
                for term in &unique_terms {
                    let tf = *doc_tf.get(term.as_str()).unwrap_or(&0);
                    if tf == 0 {
                        continue;
                    }
                    matched_terms += 1;
                    let idf = ((assumed_n as f64) / (1.0 + tf as f64)).ln().max(0.0);
                    let numerator = tf as f64 * (self.config.k1 + 1.0);
                    let denominator = tf as f64 + self.config.k1 * (1.0 - self.config.b + self.config.b * doc_len / avg_dl);
                    bm25 += idf * numerator / denominator;
                }

                if matched_terms == 0 {
                    continue;
                }

                let match_ratio = matched_terms as f64 / unique_terms.len().max(1) as f64;
                let length_penalty = (1000.0 / candidate.content.len().max(1) as f64).min(1.0);
                let score = bm25 * (1.0 + 0.5 * match_ratio) * length_penalty;

                let entry = merged
                    .entry(candidate.id.clone())
                    .or_insert((0.0, 0, candidate.content.clone(), candidate.metadata.clone()));
                entry.0 += score;
                entry.1 = entry.1.max(matched_terms);
            }
        }

        let mut results: Vec<(String, f64, usize, String, Metadata)> = merged
            .into_iter()
            .filter(|(_, (score, _, _, _))| *score >= self.config.min_score)
            .map(|(id, (score, matched, content, metadata))| (id, score, matched, content, metadata))
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(b.2.cmp(&a.2)));

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, (id, score, _, content, metadata))| FusionItem {
                id,
                content,
                score,
                rank: i + 1,
                metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{IndexedDoc, InMemorySearchIndex};

    async fn seeded_index() -> Arc<InMemorySearchIndex> {
        let index = Arc::new(InMemorySearchIndex::new());
        index
            .index(IndexedDoc {
                id: "d1".into(),
                content: "Rust memory safety without garbage collection".into(),
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        index
            .index(IndexedDoc {
                id: "d2".into(),
                content: "Python is popular for data science".into(),
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn matching_doc_outranks_unrelated_doc() {
        let index = seeded_index().await;
        let searcher = KeywordSearcher::new(KeywordSearcherConfig::default(), index);
        let hits = searcher.search("rust memory safety", &Metadata::new()).await.unwrap();
        assert_eq!(hits[0].id, "d1");
    }

    #[tokio::test]
    async fn search_multiple_merges_across_expansions() {
        let index = seeded_index().await;
        let searcher = KeywordSearcher::new(KeywordSearcherConfig::default(), index);
        let hits = searcher
            .search_multiple(&["rust safety".to_string(), "garbage collection".to_string()], &Metadata::new())
            .await
            .unwrap();
        assert!(hits.iter().any(|h| h.id == "d1"));
    }

    #[tokio::test]
    async fn below_min_score_results_are_dropped() {
        let mut config = KeywordSearcherConfig::default();
        config.min_score = 1000.0;
        let index = seeded_index().await;
        let searcher = KeywordSearcher::new(config, index);
        let hits = searcher.search("rust", &Metadata::new()).await.unwrap();
        assert!(hits.is_empty());
    }
}
