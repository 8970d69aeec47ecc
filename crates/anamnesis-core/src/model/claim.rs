use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subject-predicate-object assertion plus supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Claim {
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    /// §3 invariant: all three triple components non-empty, combined
    /// length at most 200 chars, confidence in range.
    pub fn is_valid(&self) -> bool {
        !self.subject.trim().is_empty()
            && !self.predicate.trim().is_empty()
            && !self.object.trim().is_empty()
            && self.subject.len() + self.predicate.len() + self.object.len() <= 200
            && (0.0..=1.0).contains(&self.confidence)
    }

    /// Attaches a source snippet to the claim's evidence list.
    pub fn with_evidence(mut self, snippet: impl Into<String>) -> Self {
        self.evidence.push(snippet.into());
        self
    }

    /// Dedup key: `(lower-subject, lower-predicate, lower-object)`.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.subject.trim().to_lowercase(),
            self.predicate.trim().to_lowercase(),
            self.object.trim().to_lowercase(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_claim_is_valid() {
        let c = Claim::new("Smoking", "causes", "cancer", 0.9, "s1");
        assert!(c.is_valid());
    }

    #[test]
    fn empty_object_is_invalid() {
        let c = Claim::new("Smoking", "causes", "", 0.9, "s1");
        assert!(!c.is_valid());
    }

    #[test]
    fn overlong_triple_is_invalid() {
        let long = "a".repeat(201);
        let c = Claim::new(long, "causes", "cancer", 0.9, "s1");
        assert!(!c.is_valid());
    }

    #[test]
    fn dedup_key_is_case_insensitive() {
        let a = Claim::new("Smoking", "Causes", "Cancer", 0.9, "s1");
        let b = Claim::new("smoking", "causes", "cancer", 0.5, "s2");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
