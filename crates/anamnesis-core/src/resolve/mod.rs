//! Cross-batch entity deduplication and linking (§4.4, C5).

mod entity_resolver;

pub use entity_resolver::{EntityLink, EntityResolver, ResolvedEntities};
