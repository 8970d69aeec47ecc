//! The opaque text→vector service invoked by [`crate::process::ContentProcessor`]
//! and [`crate::read::MemoryReader`] (§4.3's "Embedder contract").
//!
//! Model invocation is treated as out of scope by the spec, but the
//! contract and a deterministic fallback are not: every caller in this
//! crate depends on `Embedder`, never on a concrete model client.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbedError {
    #[error("embedding backend error: {0}")]
    Backend(String),
}

/// `async fn embed(&self, text) -> Result<Vec<f32>, EmbedError>`, fixed
/// output dimension per instance.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn dimensions(&self) -> usize;
}

/// Deterministic, always-available fallback: hashes overlapping
/// character trigrams into a fixed-width vector and L2-normalises it,
/// so cosine similarity between two embeddings is well-defined and
/// stable across runs without any model weights.
///
/// Used by tests and by callers with no real embedding model
/// configured — mirrors the reference engine's pattern of an optional
/// heavy backend with a cheap algorithmic fallback, never a hard
/// failure when the heavy backend is absent.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0f32; self.dimensions];
        let normalized = text.to_lowercase();
        let chars: Vec<char> = normalized.chars().collect();

        if chars.is_empty() {
            return Ok(vector);
        }

        const N: usize = 3;
        let windows: Vec<String> = if chars.len() < N {
            vec![normalized.clone()]
        } else {
            chars.windows(N).map(|w| w.iter().collect()).collect()
        };

        for gram in &windows {
            let hash = fnv1a(gram.as_bytes());
            let bucket = (hash as usize) % self.dimensions;
            // Second, independent hash decides the sign so unrelated
            // n-grams don't all push the same bucket positive.
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_embedding() {
        let e = HashEmbedder::new(64);
        let a = e.embed("hello world").await.unwrap();
        let b = e.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_l2_normalised() {
        let e = HashEmbedder::new(64);
        let v = e.embed("some reasonably long sentence of text").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let e = HashEmbedder::new(32);
        let v = e.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn dimensions_matches_configured_width() {
        let e = HashEmbedder::new(128);
        assert_eq!(e.dimensions(), 128);
        assert_eq!(e.embed("x").await.unwrap().len(), 128);
    }
}
