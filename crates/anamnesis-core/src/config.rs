//! Typed, `Default`-implementing configuration structs (§2 C16).
//!
//! Every tunable named by §4 gets a field here rather than a literal
//! sprinkled through the implementation. Applications construct the
//! whole tree via `Default::default()` and override piecemeal; the
//! handful of knobs that are deployment concerns rather than algorithm
//! parameters additionally read a narrow environment-variable override
//! (see [`ServiceConfig::from_env`]).

use std::time::Duration;

/// §4.1 EntityExtractor tunables.
#[derive(Debug, Clone)]
pub struct EntityExtractorConfig {
    pub min_confidence: f64,
    pub window: usize,
}

impl Default for EntityExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            window: 3,
        }
    }
}

/// §4.2 ClaimExtractor tunables.
#[derive(Debug, Clone)]
pub struct ClaimExtractorConfig {
    pub min_confidence: f64,
    pub min_sentence_len: usize,
    pub max_triple_len: usize,
}

impl Default for ClaimExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            min_sentence_len: 10,
            max_triple_len: 200,
        }
    }
}

/// §4.3 ContentProcessor tunables.
#[derive(Debug, Clone)]
pub struct ContentProcessorConfig {
    pub max_chunk_size: usize,
    pub overlap: usize,
}

impl Default for ContentProcessorConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap: 100,
        }
    }
}

impl ContentProcessorConfig {
    /// §4.3: "fails with ConfigError" if overlap is not strictly less
    /// than max_chunk_size.
    pub fn validate(&self) -> Result<(), crate::error::MemoryError> {
        if self.overlap >= self.max_chunk_size {
            return Err(crate::error::MemoryError::ConfigError(format!(
                "overlap ({}) must be less than max_chunk_size ({})",
                self.overlap, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// §4.4 EntityResolver tunables.
#[derive(Debug, Clone)]
pub struct EntityResolverConfig {
    pub similarity_threshold: f64,
    pub max_candidates: usize,
    pub link_boost: f64,
}

impl Default for EntityResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            max_candidates: 10,
            link_boost: 0.1,
        }
    }
}

/// §4.5 MemoryWriter tunables.
#[derive(Debug, Clone)]
pub struct MemoryWriterConfig {
    pub min_confidence: f64,
}

impl Default for MemoryWriterConfig {
    fn default() -> Self {
        Self { min_confidence: 0.5 }
    }
}

/// §4.6 QueryExpander tunables.
#[derive(Debug, Clone)]
pub struct QueryExpanderConfig {
    pub max_expansions: usize,
    pub synonyms: bool,
    pub paraphrases: bool,
    pub spelling: bool,
    pub acronyms: bool,
    pub context: bool,
}

impl Default for QueryExpanderConfig {
    fn default() -> Self {
        Self {
            max_expansions: 8,
            synonyms: true,
            paraphrases: true,
            spelling: true,
            acronyms: true,
            context: true,
        }
    }
}

/// §4.7 QueryProcessor tunables.
#[derive(Debug, Clone)]
pub struct QueryProcessorConfig {
    pub min_query_length: usize,
    pub expand: bool,
}

impl Default for QueryProcessorConfig {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            expand: true,
        }
    }
}

/// §4.9 KeywordSearcher (BM25) tunables.
#[derive(Debug, Clone)]
pub struct KeywordSearcherConfig {
    pub k1: f64,
    pub b: f64,
    pub min_score: f64,
    pub case_sensitive: bool,
    pub assumed_corpus_size: usize,
}

impl Default for KeywordSearcherConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            min_score: 0.1,
            case_sensitive: false,
            assumed_corpus_size: 1000,
        }
    }
}

/// §4.10 GraphSearcher tunables.
#[derive(Debug, Clone)]
pub struct GraphSearcherConfig {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for GraphSearcherConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_nodes: 100,
        }
    }
}

/// §4.11 ResultFuser tunables.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub rrf_k: f64,
    pub normalize_scores: bool,
    pub min_score: f64,
    pub max_results: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            normalize_scores: true,
            min_score: 0.0,
            max_results: 100,
        }
    }
}

/// §4.12 ResultRanker weights and thresholds.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub weight_relevance: f64,
    pub weight_freshness: f64,
    pub weight_authority: f64,
    pub weight_diversity: f64,
    pub weight_quality: f64,
    pub weight_personalization: f64,
    pub diversity_radius: f64,
    pub max_results: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weight_relevance: 1.0,
            weight_freshness: 0.2,
            weight_authority: 0.3,
            weight_diversity: 0.1,
            weight_quality: 0.4,
            weight_personalization: 0.2,
            diversity_radius: 0.5,
            max_results: 100,
        }
    }
}

/// §5 concurrency and resource tunables, read from the environment at
/// the service boundary (these are deployment concerns, not algorithm
/// parameters, hence the narrow env-var override).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_concurrent_requests: usize,
    pub default_time_budget: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 100,
            default_time_budget: Duration::from_secs(5),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("ANAMNESIS_MAX_CONCURRENT_REQUESTS") {
            if let Ok(n) = v.parse() {
                cfg.max_concurrent_requests = n;
            }
        }
        if let Ok(v) = std::env::var("ANAMNESIS_TIME_BUDGET_MS") {
            if let Ok(ms) = v.parse() {
                cfg.default_time_budget = Duration::from_millis(ms);
            }
        }
        cfg
    }
}

/// Aggregate config tree covering every component in §2.
#[derive(Debug, Clone, Default)]
pub struct AnamnesisConfig {
    pub entity_extractor: EntityExtractorConfig,
    pub claim_extractor: ClaimExtractorConfig,
    pub content_processor: ContentProcessorConfig,
    pub entity_resolver: EntityResolverConfig,
    pub memory_writer: MemoryWriterConfig,
    pub query_expander: QueryExpanderConfig,
    pub query_processor: QueryProcessorConfig,
    pub keyword_searcher: KeywordSearcherConfig,
    pub graph_searcher: GraphSearcherConfig,
    pub fusion: FusionConfig,
    pub ranking: RankingConfig,
    pub service: ServiceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_extractor_defaults_match_spec() {
        assert_eq!(EntityExtractorConfig::default().min_confidence, 0.5);
    }

    #[test]
    fn claim_extractor_defaults_match_spec() {
        let c = ClaimExtractorConfig::default();
        assert_eq!(c.min_confidence, 0.6);
        assert_eq!(c.max_triple_len, 200);
    }

    #[test]
    fn content_processor_rejects_overlap_ge_max_chunk_size() {
        let cfg = ContentProcessorConfig {
            max_chunk_size: 100,
            overlap: 100,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn content_processor_accepts_valid_overlap() {
        let cfg = ContentProcessorConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn fusion_defaults_match_spec() {
        assert_eq!(FusionConfig::default().rrf_k, 60.0);
    }

    #[test]
    fn ranking_weight_defaults_match_spec() {
        let r = RankingConfig::default();
        assert_eq!(r.weight_relevance, 1.0);
        assert_eq!(r.weight_quality, 0.4);
    }

    #[test]
    fn service_config_env_override_parses_time_budget() {
        // SAFETY: test runs single-threaded w.r.t. this env var; no
        // other test reads ANAMNESIS_TIME_BUDGET_MS concurrently.
        unsafe {
            std::env::set_var("ANAMNESIS_TIME_BUDGET_MS", "1234");
        }
        let cfg = ServiceConfig::from_env();
        assert_eq!(cfg.default_time_budget, Duration::from_millis(1234));
        unsafe {
            std::env::remove_var("ANAMNESIS_TIME_BUDGET_MS");
        }
    }
}
