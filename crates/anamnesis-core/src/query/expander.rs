use std::collections::HashMap;
use std::sync::LazyLock;

use super::processor::{ParsedQuery, QueryType};
use crate::config::QueryExpanderConfig;

static SYNONYMS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("fast", "quick"),
        ("big", "large"),
        ("smart", "intelligent"),
        ("help", "assist"),
        ("buy", "purchase"),
        ("car", "automobile"),
        ("house", "home"),
        ("happy", "glad"),
        ("sad", "unhappy"),
        ("easy", "simple"),
        ("hard", "difficult"),
        ("start", "begin"),
        ("end", "finish"),
        ("error", "fault"),
        ("bug", "defect"),
    ]
    .into_iter()
    .collect()
});

static PARAPHRASES: LazyLock<Vec<(&'static str, &'static [&'static str])>> = LazyLock::new(|| {
    vec![
        ("how to", &["ways to", "methods to", "steps to"][..]),
        ("what is", &["define", "explain", "describe"][..]),
        ("why does", &["reason for", "cause of"][..]),
        ("where can i", &["location of", "place to find"][..]),
    ]
});

static MISSPELLINGS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("recieve", "receive"),
        ("teh", "the"),
        ("seperate", "separate"),
        ("definately", "definitely"),
        ("occured", "occurred"),
        ("acheive", "achieve"),
        ("wich", "which"),
        ("untill", "until"),
    ]
    .into_iter()
    .collect()
});

static ACRONYMS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("ai", "artificial intelligence"),
        ("nlp", "natural language processing"),
        ("ml", "machine learning"),
        ("api", "application programming interface"),
        ("faq", "frequently asked questions"),
        ("ceo", "chief executive officer"),
        ("diy", "do it yourself"),
    ]
    .into_iter()
    .collect()
});

/// Produces bounded, deduplicated query-string expansions across five
/// independently toggleable families (§4.6, C7).
pub struct QueryExpander {
    config: QueryExpanderConfig,
}

impl QueryExpander {
    pub fn new(config: QueryExpanderConfig) -> Self {
        Self { config }
    }

    pub fn expand(&self, query: &str, parsed: &ParsedQuery) -> Vec<String> {
        let mut out = Vec::new();

        if self.config.synonyms {
            out.extend(self.synonym_expansions(query));
        }
        if self.config.paraphrases {
            out.extend(self.paraphrase_expansions(query, parsed));
        }
        if self.config.spelling {
            out.extend(self.spelling_expansions(query, parsed));
        }
        if self.config.acronyms {
            out.extend(self.acronym_expansions(query, parsed));
        }
        if self.config.context {
            out.extend(self.context_expansions(query, parsed));
        }

        let mut seen = std::collections::HashSet::new();
        out.retain(|candidate| seen.insert(candidate.to_lowercase()));
        out.truncate(self.config.max_expansions);
        out
    }

    fn synonym_expansions(&self, query: &str) -> Vec<String> {
        let lower = query.to_lowercase();
        let mut expansions = Vec::new();
        for (word, synonym) in SYNONYMS.iter() {
            if has_word(&lower, word) {
                expansions.push(replace_word(&lower, word, synonym));
            }
        }
        expansions
    }

    fn paraphrase_expansions(&self, query: &str, parsed: &ParsedQuery) -> Vec<String> {
        let lower = query.to_lowercase();
        let mut expansions = Vec::new();
        for (pattern, replacements) in PARAPHRASES.iter() {
            if let Some(rest) = lower.strip_prefix(pattern) {
                for replacement in replacements.iter() {
                    expansions.push(format!("{replacement}{rest}"));
                }
            }
        }
        if parsed.terms.len() > 1 {
            let reversed: Vec<&str> = parsed.terms.iter().rev().map(String::as_str).collect();
            expansions.push(reversed.join(" "));
        }
        expansions
    }

    fn spelling_expansions(&self, query: &str, parsed: &ParsedQuery) -> Vec<String> {
        let lower = query.to_lowercase();
        let mut expansions = Vec::new();
        for (wrong, right) in MISSPELLINGS.iter() {
            if has_word(&lower, wrong) {
                expansions.push(replace_word(&lower, wrong, right));
            }
        }
        for term in &parsed.terms {
            if term.chars().count() < 4 {
                continue;
            }
            for variant in typo_variants(term).into_iter().take(3) {
                expansions.push(replace_word(&lower, term, &variant));
            }
        }
        expansions
    }

    fn acronym_expansions(&self, query: &str, parsed: &ParsedQuery) -> Vec<String> {
        let lower = query.to_lowercase();
        let mut expansions = Vec::new();
        for (acronym, expansion) in ACRONYMS.iter() {
            if has_word(&lower, acronym) {
                expansions.push(replace_word(&lower, acronym, expansion));
            }
        }

        if let Some(phrase) = parsed.phrases.first() {
            if let Some(acronym) = initialism(phrase) {
                expansions.push(acronym);
            }
        } else if parsed.terms.len() > 1 {
            if let Some(acronym) = initialism(&parsed.terms.join(" ")) {
                expansions.push(acronym);
            }
        }
        expansions
    }

    fn context_expansions(&self, query: &str, parsed: &ParsedQuery) -> Vec<String> {
        let mut expansions = Vec::new();
        match parsed.query_type {
            QueryType::Entity => {
                expansions.push(format!("{query} information"));
                expansions.push(format!("about {query}"));
            }
            QueryType::Semantic => {
                expansions.push(format!("{query} explanation"));
                expansions.push(format!("what is {query}"));
            }
            QueryType::Keyword | QueryType::Hybrid => {
                expansions.push(format!("{query} examples"));
                expansions.push(format!("{query} usage"));
            }
        }
        expansions.push(format!("what is {query}"));
        expansions.push(format!("how does {query} work"));
        expansions.push(format!("why {query}"));
        expansions.push(format!("when {query}"));
        expansions.push(format!("{query} guide"));
        if let Some(range) = &parsed.time_range {
            let _ = range;
            expansions.push(format!("{query} latest"));
            expansions.push(format!("{query} today"));
            expansions.push(format!("{query} this week"));
            expansions.push(format!("{query} recently"));
        }
        expansions
    }
}

fn has_word(haystack: &str, word: &str) -> bool {
    haystack.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == word)
}

fn replace_word(haystack: &str, word: &str, replacement: &str) -> String {
    haystack
        .split_whitespace()
        .map(|w| {
            if w.trim_matches(|c: char| !c.is_alphanumeric()) == word {
                replacement.to_string()
            } else {
                w.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First-letter initialism, quoted-phrase convention preferred by the
/// caller, uppercase.
fn initialism(phrase: &str) -> Option<String> {
    let letters: String = phrase
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .filter(|c| c.is_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if letters.chars().count() >= 2 {
        Some(letters)
    } else {
        None
    }
}

/// Up to a handful of adjacent-transpose / single-deletion typo
/// variants of `term`.
fn typo_variants(term: &str) -> Vec<String> {
    let chars: Vec<char> = term.chars().collect();
    let mut variants = Vec::new();

    for i in 0..chars.len().saturating_sub(1) {
        if chars[i] != chars[i + 1] {
            let mut v = chars.clone();
            v.swap(i, i + 1);
            variants.push(v.into_iter().collect());
        }
    }
    for i in 0..chars.len() {
        let mut v = chars.clone();
        v.remove(i);
        variants.push(v.into_iter().collect());
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryProcessor;
    use crate::config::QueryProcessorConfig;

    fn parsed(query: &str) -> ParsedQuery {
        QueryProcessor::new(QueryProcessorConfig::default(), QueryExpander::new(Default::default()))
            .process(query)
            .unwrap()
            .parsed
    }

    #[test]
    fn synonym_substitution_applies() {
        let expander = QueryExpander::new(Default::default());
        let p = parsed("fast car");
        let out = expander.expand("fast car", &p);
        assert!(out.iter().any(|e| e.contains("quick") || e.contains("automobile")));
    }

    #[test]
    fn acronym_expands_known_term() {
        let expander = QueryExpander::new(Default::default());
        let p = parsed("ai ethics");
        let out = expander.expand("ai ethics", &p);
        assert!(out.iter().any(|e| e.contains("artificial intelligence")));
    }

    #[test]
    fn expansions_are_capped_and_deduplicated() {
        let expander = QueryExpander::new(Default::default());
        let p = parsed("how to fix a fast car today");
        let out = expander.expand("how to fix a fast car today", &p);
        assert!(out.len() <= QueryExpanderConfig::default().max_expansions);
        let mut seen = std::collections::HashSet::new();
        assert!(out.iter().all(|e| seen.insert(e.to_lowercase())));
    }

    #[test]
    fn initialism_requires_at_least_two_letters() {
        assert_eq!(initialism("hello"), None);
        assert_eq!(initialism("machine learning"), Some("ML".to_string()));
    }
}
