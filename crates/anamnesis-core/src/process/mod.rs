//! Chunking + per-chunk extraction (§4.3, C4).

mod content_processor;

pub use content_processor::{ContentProcessor, ProcessingResult};
