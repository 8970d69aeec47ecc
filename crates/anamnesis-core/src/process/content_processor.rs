use std::sync::Arc;

use crate::config::ContentProcessorConfig;
use crate::embed::Embedder;
use crate::error::{MemoryError, Result};
use crate::extract::{ClaimExtractor, EntityExtractor};
use crate::model::{Chunk, Claim, Entity};

/// Output of [`ContentProcessor::process`] (§4.3).
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub chunks: Vec<Chunk>,
    pub entities: Vec<Entity>,
    pub claims: Vec<Claim>,
}

/// Splits raw text into overlapping chunks, embeds each, and runs the
/// entity/claim extractors over each chunk's content (§4.3, C4).
pub struct ContentProcessor {
    config: ContentProcessorConfig,
    embedder: Arc<dyn Embedder>,
    entity_extractor: EntityExtractor,
    claim_extractor: ClaimExtractor,
}

impl ContentProcessor {
    pub fn new(
        config: ContentProcessorConfig,
        embedder: Arc<dyn Embedder>,
        entity_extractor: EntityExtractor,
        claim_extractor: ClaimExtractor,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            entity_extractor,
            claim_extractor,
        })
    }

    pub async fn process(
        &self,
        content: &str,
        source: &str,
        confidence: f64,
    ) -> Result<ProcessingResult> {
        let mut chunks = Vec::new();
        let mut all_entities = Vec::new();
        let mut all_claims = Vec::new();

        for piece in self.split(content) {
            let mut chunk = Chunk::new(piece.clone(), source, confidence);

            let embedding = self
                .embedder
                .embed(&piece)
                .await
                .map_err(|e| MemoryError::persistence("embedder", e))?;
            chunk.embedding = Some(embedding);

            let entities = self.entity_extractor.extract(&piece, source);
            let claims = self.claim_extractor.extract(&piece, source);

            chunk.entities = entities.clone();
            chunk.claims = claims.clone();

            all_entities.extend(entities);
            all_claims.extend(claims);
            chunks.push(chunk);
        }

        Ok(ProcessingResult {
            chunks,
            entities: all_entities,
            claims: all_claims,
        })
    }

    /// Splits `content` into pieces of at most `max_chunk_size` chars
    /// with `overlap` chars shared between consecutive pieces,
    /// preferring to break on whitespace near the boundary.
    fn split(&self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        if chars.len() <= self.config.max_chunk_size {
            return vec![content.to_string()];
        }

        let step = self.config.max_chunk_size - self.config.overlap;
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = (start + self.config.max_chunk_size).min(chars.len());
            if end < chars.len() {
                if let Some(boundary) = (start + step..end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = boundary;
                }
            }
            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                pieces.push(trimmed.to_string());
            }
            if end >= chars.len() {
                break;
            }
            start += step;
        }
        pieces
    }
}
