//! Rule-based named-entity recognition (§4.1).
//!
//! Two extraction modes feed the same pipeline: a registry of compiled
//! regular expressions for structured types (EMAIL, URL, PHONE, DATE,
//! NUMBER), and a keyword→type map for titles/suffixes (e.g. "Dr.",
//! "Inc.", "Street") that triggers a bounded window scan for adjacent
//! capitalised spans. Both registries are built once and held behind
//! the extractor (§9, "Global state").

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::EntityExtractorConfig;
use crate::model::{Entity, EntityType};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s]+|www\.[^\s]+\.[A-Za-z]{2,}[^\s]*").unwrap()
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
    )
    .unwrap()
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+(?:,\d{3})*(?:\.\d+)?%?\b").unwrap()
});

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'.]*").unwrap());

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "this", "that", "these", "those", "he", "she", "it", "they", "we",
        "you", "i", "him", "her", "them", "us", "in", "on", "at", "by", "for", "with", "about",
        "of", "to", "from", "as", "is", "are", "was", "were", "be", "been", "and", "or", "but",
    ]
    .into_iter()
    .collect()
});

/// `(matching keyword, entity type, specificity in [0,1])`.
static KEYWORD_MAP: LazyLock<Vec<(&'static str, EntityType, f64, ScanDirection)>> =
    LazyLock::new(|| {
        use EntityType::*;
        use ScanDirection::*;
        vec![
            ("dr.", Person, 0.6, Right),
            ("dr", Person, 0.4, Right),
            ("mr.", Person, 0.6, Right),
            ("mrs.", Person, 0.6, Right),
            ("ms.", Person, 0.6, Right),
            ("prof.", Person, 0.7, Right),
            ("professor", Person, 0.8, Right),
            ("inc.", Organization, 0.7, Left),
            ("inc", Organization, 0.5, Left),
            ("corp.", Organization, 0.7, Left),
            ("corporation", Organization, 0.8, Left),
            ("llc", Organization, 0.7, Left),
            ("ltd.", Organization, 0.7, Left),
            ("company", Organization, 0.6, Left),
            ("street", Location, 0.6, Left),
            ("avenue", Location, 0.6, Left),
            ("road", Location, 0.5, Left),
            ("boulevard", Location, 0.7, Left),
            ("drive", Location, 0.5, Left),
            ("lane", Location, 0.5, Left),
            ("square", Location, 0.5, Left),
        ]
    });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanDirection {
    Left,
    Right,
}

/// Rule-based entity extractor (§4.1). `extract` never fails.
pub struct EntityExtractor {
    config: EntityExtractorConfig,
}

impl EntityExtractor {
    pub fn new(config: EntityExtractorConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, text: &str, source: &str) -> Vec<Entity> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        candidates.extend(self.extract_structured(text, source));
        candidates.extend(self.extract_keyword_derived(text, source));

        self.filter_and_dedup(candidates)
    }

    fn extract_structured(&self, text: &str, source: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        for m in EMAIL_RE.find_iter(text) {
            out.push(Entity::new(m.as_str(), EntityType::Email, 0.95, source));
        }
        for m in URL_RE.find_iter(text) {
            out.push(Entity::new(m.as_str(), EntityType::Url, 0.95, source));
        }
        for m in PHONE_RE.find_iter(text) {
            out.push(Entity::new(m.as_str(), EntityType::Phone, 0.95, source));
        }
        for m in DATE_RE.find_iter(text) {
            out.push(Entity::new(m.as_str(), EntityType::Date, 0.85, source));
        }
        for m in NUMBER_RE.find_iter(text) {
            // Numbers embedded in phone numbers/dates are already
            // captured above with higher specificity; skip ones that
            // overlap those spans to avoid noisy duplicate NUMBER hits.
            let overlaps = PHONE_RE.find_iter(text).any(|p| p.range().contains(&m.start()))
                || DATE_RE.find_iter(text).any(|d| d.range().contains(&m.start()));
            if !overlaps {
                out.push(Entity::new(m.as_str(), EntityType::Number, 0.85, source));
            }
        }
        out
    }

    fn extract_keyword_derived(&self, text: &str, source: &str) -> Vec<Entity> {
        let tokens: Vec<regex::Match> = WORD_RE.find_iter(text).collect();
        let window = self.config.window;
        let mut out = Vec::new();

        for (i, tok) in tokens.iter().enumerate() {
            let lower = tok.as_str().to_lowercase();
            let Some((_, entity_type, specificity, direction)) =
                KEYWORD_MAP.iter().find(|(kw, ..)| *kw == lower)
            else {
                continue;
            };

            let span = match direction {
                ScanDirection::Right => capitalized_run_right(&tokens, i, window, text),
                ScanDirection::Left => capitalized_run_left(&tokens, i, window, text),
            };

            let Some(name) = span else { continue };
            let length_bonus = ((name.chars().count() as f64 - 2.0) / 20.0).clamp(0.0, 1.0) * 0.1;
            let confidence = (0.6 + length_bonus + specificity * 0.1).clamp(0.6, 0.8);
            out.push(Entity::new(name, entity_type.clone(), confidence, source));
        }
        out
    }

    fn filter_and_dedup(&self, candidates: Vec<Entity>) -> Vec<Entity> {
        let mut seen: HashMap<(String, EntityType), Entity> = HashMap::new();
        for e in candidates {
            let normalized = e.normalised_name();
            if STOP_WORDS.contains(normalized.as_str()) {
                continue;
            }
            if !(2..=100).contains(&normalized.len()) {
                continue;
            }
            if e.confidence < self.config.min_confidence {
                continue;
            }
            let key = (normalized, e.entity_type.clone());
            match seen.get(&key) {
                Some(existing) if existing.confidence >= e.confidence => {}
                _ => {
                    seen.insert(key, e);
                }
            }
        }
        seen.into_values().collect()
    }
}

fn is_capitalized(m: &regex::Match) -> bool {
    m.as_str().chars().next().is_some_and(|c| c.is_uppercase())
}

/// Scans up to `window` tokens to the right of the keyword at `origin`,
/// returning the maximal contiguous capitalised run immediately
/// following it (e.g. "Dr. |Smith|").
fn capitalized_run_right(
    tokens: &[regex::Match],
    origin: usize,
    window: usize,
    text: &str,
) -> Option<String> {
    let start = origin + 1;
    let mut end = start;
    while end < tokens.len() && end < start + window && is_capitalized(&tokens[end]) {
        end += 1;
    }
    if end == start {
        return None;
    }
    let lo = tokens[start].start();
    let hi = tokens[end - 1].end();
    Some(text[lo..hi].to_string())
}

/// Scans up to `window` tokens to the left of the keyword at `origin`,
/// returning the maximal contiguous capitalised run immediately
/// preceding it (e.g. "|Acme| Inc.").
fn capitalized_run_left(
    tokens: &[regex::Match],
    origin: usize,
    window: usize,
    text: &str,
) -> Option<String> {
    if origin == 0 {
        return None;
    }
    let floor = origin.saturating_sub(window);
    let mut start = origin;
    while start > floor && is_capitalized(&tokens[start - 1]) {
        start -= 1;
    }
    if start == origin {
        return None;
    }
    let lo = tokens[start].start();
    let hi = tokens[origin - 1].end();
    Some(text[lo..hi].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(EntityExtractorConfig::default())
    }

    #[test]
    fn empty_text_returns_empty() {
        assert!(extractor().extract("", "s1").is_empty());
    }

    #[test]
    fn extracts_email_with_high_confidence() {
        let entities = extractor().extract("Contact us at hello@example.com today.", "s1");
        let e = entities
            .iter()
            .find(|e| e.entity_type == EntityType::Email)
            .unwrap();
        assert_eq!(e.name, "hello@example.com");
        assert!(e.confidence >= 0.9);
    }

    #[test]
    fn extracts_url() {
        let entities = extractor().extract("See https://example.com/docs for details.", "s1");
        assert!(entities.iter().any(|e| e.entity_type == EntityType::Url));
    }

    #[test]
    fn extracts_person_from_title_keyword() {
        let entities = extractor().extract("Dr. Smith works at Acme Inc.", "s1");
        let person = entities
            .iter()
            .find(|e| e.entity_type == EntityType::Person);
        assert!(person.is_some(), "{entities:?}");
        assert!(person.unwrap().name.contains("Smith"));
    }

    #[test]
    fn extracts_organization_from_suffix_keyword() {
        let entities = extractor().extract("Dr. Smith works at Acme Inc.", "s1");
        let org = entities
            .iter()
            .find(|e| e.entity_type == EntityType::Organization);
        assert!(org.is_some(), "{entities:?}");
        assert!(org.unwrap().name.contains("Acme"));
    }

    #[test]
    fn drops_stop_words_and_short_names() {
        let entities = extractor().extract("The the The.", "s1");
        assert!(entities.is_empty());
    }

    #[test]
    fn dedups_by_name_and_type_keeping_higher_confidence() {
        let entities = extractor().extract("hello@example.com and hello@example.com again.", "s1");
        let emails: Vec<_> = entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Email)
            .collect();
        assert_eq!(emails.len(), 1);
    }
}
