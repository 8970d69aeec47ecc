//! Error taxonomy (§7).
//!
//! CPU-bound stages (parsing, extraction, scoring) never retry and
//! never wrap a lower-level error — they construct one of these
//! variants directly. Store-adapter errors are distinct smaller
//! `thiserror` enums at the trait boundary (see [`crate::stores`]) and
//! convert into [`MemoryError::PersistenceError`] via `From`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("query too short: need at least {min} characters, got {actual}")]
    QueryTooShort { min: usize, actual: usize },

    #[error("content rejected: {0}")]
    ContentRejected(String),

    #[error("evidence required for one or more persisted claims")]
    EvidenceRequired,

    #[error("persistence error in {store}: {source}")]
    PersistenceError {
        store: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("request cancelled")]
    Cancelled,

    /// Not a terminal failure: the read path returns `Ok` with
    /// `stats.partial = true` on time-budget exhaustion (§4.13, §8).
    /// This variant exists for taxonomy completeness and for callers
    /// (e.g. the `manage` RPC) that need to signal a partial
    /// completion as an error rather than a degraded success value.
    #[error("timed out with partial results")]
    TimeoutPartial,

    #[error("overloaded: admission limit reached")]
    Overloaded,

    #[error("config error: {0}")]
    ConfigError(String),
}

impl MemoryError {
    pub fn persistence(store: &'static str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        MemoryError::PersistenceError {
            store,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
