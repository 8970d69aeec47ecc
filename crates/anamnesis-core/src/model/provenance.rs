use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One immutable record per successful write, linking a persisted
/// memory id back to its source, actor and content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProvenanceRecord {
    pub id: String,
    pub memory_id: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub version: u32,
    pub content_hash: String,
}

impl ProvenanceRecord {
    pub fn new(
        memory_id: impl Into<String>,
        source: impl Into<String>,
        user_id: Option<String>,
        content: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            memory_id: memory_id.into(),
            source: source.into(),
            timestamp: Utc::now(),
            user_id,
            version: 1,
            content_hash: content_hash(content),
        }
    }
}

/// A stable, dependency-free content fingerprint (FNV-1a, 64-bit) used
/// purely for provenance bookkeeping — not a security primitive.
fn content_hash(content: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for byte in content.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("world"));
    }

    #[test]
    fn provenance_record_carries_memory_id() {
        let p = ProvenanceRecord::new("m1", "s1", None, "hello");
        assert_eq!(p.memory_id, "m1");
        assert_eq!(p.version, 1);
    }
}
