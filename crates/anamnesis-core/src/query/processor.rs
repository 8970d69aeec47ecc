use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;

use crate::config::QueryProcessorConfig;
use crate::error::{MemoryError, Result};

use super::expander::QueryExpander;

static PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b([a-z_][a-z0-9_]*):(\S+)\b").unwrap());

static STOP_WORDS: LazyLock<std::collections::HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "of", "in", "on", "at", "to", "for", "and",
        "or", "but", "with", "by", "from", "as", "it", "this", "that",
    ]
    .into_iter()
    .collect()
});

/// A relative time window resolved against the moment of parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Coarse intent classification driving which retrievers and expansion
/// templates apply (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Semantic,
    Hybrid,
    Entity,
    Keyword,
}

/// Deterministic parse of a raw query string (§4.7 "Parse").
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub raw: String,
    pub terms: Vec<String>,
    pub phrases: Vec<String>,
    pub filters: HashMap<String, String>,
    pub time_range: Option<TimeRange>,
    pub query_type: QueryType,
}

/// Output of [`QueryProcessor::process`]: the parse plus a capped,
/// original-first list of query-string expansions.
#[derive(Debug, Clone)]
pub struct ProcessedQuery {
    pub parsed: ParsedQuery,
    pub expansions: Vec<String>,
}

/// Parses raw queries and, when enabled, invokes [`QueryExpander`]
/// (§4.7, C8).
pub struct QueryProcessor {
    config: QueryProcessorConfig,
    expander: QueryExpander,
}

impl QueryProcessor {
    pub fn new(config: QueryProcessorConfig, expander: QueryExpander) -> Self {
        Self { config, expander }
    }

    pub fn process(&self, query: &str) -> Result<ProcessedQuery> {
        let trimmed = query.trim();
        let actual = trimmed.chars().count();
        if actual < self.config.min_query_length {
            return Err(MemoryError::QueryTooShort {
                min: self.config.min_query_length,
                actual,
            });
        }

        let parsed = self.parse(trimmed);

        let mut expansions = vec![trimmed.to_string()];
        if self.config.expand {
            for candidate in self.expander.expand(trimmed, &parsed) {
                if !expansions.iter().any(|e| e.eq_ignore_ascii_case(&candidate)) {
                    expansions.push(candidate);
                }
            }
        }
        expansions.truncate(10);

        Ok(ProcessedQuery { parsed, expansions })
    }

    fn parse(&self, query: &str) -> ParsedQuery {
        let phrases: Vec<String> = PHRASE_RE
            .captures_iter(query)
            .map(|c| c[1].to_lowercase())
            .collect();
        let without_phrases = PHRASE_RE.replace_all(query, " ").to_lowercase();

        let mut filters = HashMap::new();
        let without_filters = FILTER_RE.replace_all(&without_phrases, |c: &regex::Captures| {
            filters.insert(c[1].to_lowercase(), c[2].to_string());
            " ".to_string()
        });

        let terms: Vec<String> = without_filters
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t.as_str()))
            .collect();

        let time_range = detect_time_range(&without_phrases);

        let first_term_capitalized = query
            .split_whitespace()
            .next()
            .and_then(|w| w.chars().next())
            .is_some_and(|c| c.is_uppercase());

        let query_type = if !phrases.is_empty() {
            QueryType::Semantic
        } else if !filters.is_empty() {
            QueryType::Hybrid
        } else if (1..=2).contains(&terms.len()) && first_term_capitalized {
            QueryType::Entity
        } else {
            QueryType::Keyword
        };

        ParsedQuery {
            raw: query.to_string(),
            terms,
            phrases,
            filters,
            time_range,
            query_type,
        }
    }
}

fn detect_time_range(text: &str) -> Option<TimeRange> {
    let now = Utc::now();
    let today_midnight = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);

    if text.contains("yesterday") {
        Some(TimeRange {
            start: today_midnight - Duration::days(1),
            end: today_midnight,
        })
    } else if text.contains("today") {
        Some(TimeRange {
            start: today_midnight,
            end: now,
        })
    } else if text.contains("last week") {
        Some(TimeRange {
            start: now - Duration::weeks(1),
            end: now,
        })
    } else if text.contains("last month") {
        Some(TimeRange {
            start: now - Duration::days(30),
            end: now,
        })
    } else if text.contains("recent") {
        Some(TimeRange {
            start: now - Duration::days(3),
            end: now,
        })
    } else {
        None
    }
}

use chrono::Datelike;
