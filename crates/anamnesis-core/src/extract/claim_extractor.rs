//! Subject-predicate-object claim extraction (§4.2).
//!
//! Four independent pattern families are tried against every sentence:
//! SVO (generic verb scan), Definition, Causal, Temporal. Each family
//! that matches contributes a candidate claim; all candidates are then
//! scored, validated and deduplicated together.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ClaimExtractorConfig;
use crate::model::Claim;

static SENTENCE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+\s+").unwrap());

static FACTUAL_INDICATORS: &[&str] = &[
    "according to",
    "research shows",
    "studies indicate",
    "studies show",
    "evidence suggests",
    "data shows",
];

static OPINION_INDICATORS: &[&str] =
    &["think", "believe", "seems", "feels like", "in my opinion", "i guess"];

static STRONG_FACTUAL_VERBS: &[&str] =
    &["causes", "is", "was", "are", "were", "demonstrates", "proves", "confirms", "occurred"];

static TRIVIAL_PATTERNS: &[&str] = &["this is", "it is", "that is", "there is"];

/// `(verb surface form, lemma predicate)` — copula, possession, modal,
/// reporting, action and change verbs catalogued per §4.2.
static VERB_PATTERNS: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    vec![
        (" is ", "is"),
        (" are ", "is"),
        (" was ", "is"),
        (" were ", "is"),
        (" has ", "has"),
        (" have ", "has"),
        (" had ", "has"),
        (" owns ", "owns"),
        (" can ", "can"),
        (" could ", "could"),
        (" should ", "should"),
        (" would ", "would"),
        (" must ", "must"),
        (" might ", "might"),
        (" said ", "said"),
        (" reported ", "reported"),
        (" stated ", "stated"),
        (" announced ", "announced"),
        (" became ", "became"),
        (" turned into ", "became"),
        (" changed to ", "became"),
        (" transformed into ", "became"),
        (" creates ", "creates"),
        (" produces ", "produces"),
        (" requires ", "requires"),
        (" includes ", "includes"),
        (" contains ", "contains"),
    ]
});

static DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(?:is defined as|means|refers to)\s+(.+)$")
        .unwrap()
});

static DEFINITION_COLON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]{3,60}):\s*(.+)$").unwrap());

static CAUSAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(?:causes|leads to|results in)\s+(.+)$").unwrap()
});

static CAUSAL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:because of|due to)\s+(.+?),\s*(.+)$").unwrap()
});

static TEMPORAL_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^In\s+(\d{4}),\s*(.+)$").unwrap());

static TEMPORAL_ON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^On\s+([A-Za-z]+\s+\d{1,2}(?:,?\s+\d{4})?),\s*(.+)$").unwrap());

static TEMPORAL_REL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(before|after|during)\s+(.+)$").unwrap()
});

fn has_proper_noun(text: &str) -> bool {
    text.split_whitespace()
        .skip(1) // skip the sentence-initial word, which is capitalised regardless
        .any(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
}

/// Pattern-based claim extractor (§4.2).
pub struct ClaimExtractor {
    config: ClaimExtractorConfig,
}

impl ClaimExtractor {
    pub fn new(config: ClaimExtractorConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, text: &str, source: &str) -> Vec<Claim> {
        let mut candidates = Vec::new();
        for sentence in self.split_sentences(text) {
            candidates.extend(self.definition_claims(&sentence, source));
            candidates.extend(self.causal_claims(&sentence, source));
            candidates.extend(self.temporal_claims(&sentence, source));
            candidates.extend(self.svo_claims(&sentence, source));
        }
        self.validate_and_dedup(candidates)
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        SENTENCE_SPLIT_RE
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| s.len() >= self.config.min_sentence_len)
            .collect()
    }

    fn definition_claims(&self, sentence: &str, source: &str) -> Vec<Claim> {
        if let Some(caps) = DEFINITION_RE.captures(sentence) {
            let subject = caps[1].trim();
            let object = caps[2].trim();
            let conf = self.score(sentence, subject, object, true, false);
            return vec![Claim::new(subject, "is_defined_as", object, conf, source).with_evidence(sentence)];
        }
        if let Some(caps) = DEFINITION_COLON_RE.captures(sentence) {
            let subject = caps[1].trim();
            let object = caps[2].trim();
            if !subject.is_empty() && !object.is_empty() {
                let conf = self.score(sentence, subject, object, true, false);
                return vec![Claim::new(subject, "is_defined_as", object, conf, source).with_evidence(sentence)];
            }
        }
        Vec::new()
    }

    fn causal_claims(&self, sentence: &str, source: &str) -> Vec<Claim> {
        if let Some(caps) = CAUSAL_RE.captures(sentence) {
            let subject = caps[1].trim();
            let object = caps[2].trim();
            let conf = self.score(sentence, subject, object, false, true);
            return vec![Claim::new(subject, "causes", object, conf, source).with_evidence(sentence)];
        }
        if let Some(caps) = CAUSAL_PREFIX_RE.captures(sentence) {
            let subject = caps[1].trim();
            let object = caps[2].trim();
            let conf = self.score(sentence, subject, object, false, true);
            return vec![Claim::new(subject, "causes", object, conf, source).with_evidence(sentence)];
        }
        Vec::new()
    }

    fn temporal_claims(&self, sentence: &str, source: &str) -> Vec<Claim> {
        if let Some(caps) = TEMPORAL_YEAR_RE.captures(sentence) {
            let time = caps[1].trim();
            let event = caps[2].trim();
            let conf = self.score(sentence, event, time, false, false);
            return vec![Claim::new(event, "occurs_during", time, conf, source).with_evidence(sentence)];
        }
        if let Some(caps) = TEMPORAL_ON_RE.captures(sentence) {
            let time = caps[1].trim();
            let event = caps[2].trim();
            let conf = self.score(sentence, event, time, false, false);
            return vec![Claim::new(event, "occurs_during", time, conf, source).with_evidence(sentence)];
        }
        if let Some(caps) = TEMPORAL_REL_RE.captures(sentence) {
            let event = caps[1].trim();
            let time = caps[3].trim();
            let conf = self.score(sentence, event, time, false, false);
            return vec![Claim::new(event, "occurs_during", time, conf, source).with_evidence(sentence)];
        }
        Vec::new()
    }

    fn svo_claims(&self, sentence: &str, source: &str) -> Vec<Claim> {
        let padded = format!(" {sentence} ");
        let lower = padded.to_lowercase();
        let mut best: Option<(usize, &str, &str)> = None;
        for (surface, lemma) in VERB_PATTERNS.iter() {
            if let Some(pos) = lower.find(surface) {
                if best.is_none_or(|(best_pos, ..)| pos < best_pos) {
                    best = Some((pos, surface, lemma));
                }
            }
        }
        let Some((pos, surface, lemma)) = best else {
            return Vec::new();
        };
        let subject = padded[..pos].trim();
        let object = padded[pos + surface.len()..].trim();
        if subject.is_empty() || object.is_empty() {
            return Vec::new();
        }
        let conf = self.score(sentence, subject, object, false, false);
        vec![Claim::new(subject, *lemma, object, conf, source).with_evidence(sentence)]
    }

    fn score(&self, sentence: &str, subject: &str, object: &str, is_definition: bool, is_causal: bool) -> f64 {
        let lower = sentence.to_lowercase();
        let mut score = 0.5;
        if FACTUAL_INDICATORS.iter().any(|i| lower.contains(i)) {
            score += 0.1;
        }
        let predicate_is_strong = is_causal
            || STRONG_FACTUAL_VERBS
                .iter()
                .any(|v| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *v));
        if predicate_is_strong {
            score += 0.2;
        }
        if has_proper_noun(subject) {
            score += 0.1;
        }
        if has_proper_noun(object) {
            score += 0.1;
        }
        if OPINION_INDICATORS.iter().any(|i| lower.contains(i)) {
            score -= 0.2;
        }
        if is_definition {
            score += 0.1;
        }
        score.clamp(0.0, 1.0)
    }

    fn validate_and_dedup(&self, candidates: Vec<Claim>) -> Vec<Claim> {
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut out = Vec::new();
        for claim in candidates {
            if claim.confidence < self.config.min_confidence {
                continue;
            }
            let total_len = claim.subject.len() + claim.predicate.len() + claim.object.len();
            if total_len > self.config.max_triple_len {
                continue;
            }
            if claim.subject.trim().len() < 3 || claim.object.trim().len() < 3 {
                continue;
            }
            let lower_subject = claim.subject.trim().to_lowercase();
            if TRIVIAL_PATTERNS.iter().any(|p| lower_subject == *p) {
                continue;
            }
            let key = claim.dedup_key();
            if seen.insert(key) {
                out.push(claim);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ClaimExtractor {
        ClaimExtractor::new(ClaimExtractorConfig::default())
    }

    #[test]
    fn extracts_causal_claim_with_subject_and_object() {
        let claims = extractor().extract("Smoking causes cancer in many patients worldwide.", "s1");
        let claim = claims.iter().find(|c| c.predicate == "causes");
        assert!(claim.is_some(), "{claims:?}");
        let claim = claim.unwrap();
        assert!(claim.subject.contains("Smoking"));
        assert!(claim.object.contains("cancer"));
    }

    #[test]
    fn extracts_definition_claim() {
        let claims = extractor().extract("Photosynthesis is defined as the process plants use.", "s1");
        assert!(claims.iter().any(|c| c.predicate == "is_defined_as"));
    }

    #[test]
    fn extracts_temporal_claim_with_year() {
        let claims = extractor().extract("In 1969, astronauts landed on the moon successfully.", "s1");
        assert!(claims.iter().any(|c| c.predicate == "occurs_during"));
    }

    #[test]
    fn drops_opinion_sentences_below_threshold() {
        let claims = extractor().extract("I think this movie is pretty good overall.", "s1");
        assert!(claims.iter().all(|c| c.confidence >= 0.6));
    }

    #[test]
    fn dedups_identical_triples() {
        let claims = extractor().extract(
            "Smoking causes cancer in the lungs. Smoking causes cancer in the lungs.",
            "s1",
        );
        let causal: Vec<_> = claims.iter().filter(|c| c.predicate == "causes").collect();
        assert_eq!(causal.len(), 1);
    }

    #[test]
    fn short_sentences_are_ignored() {
        let claims = extractor().extract("Hi. Ok. Go now.", "s1");
        assert!(claims.is_empty());
    }
}
