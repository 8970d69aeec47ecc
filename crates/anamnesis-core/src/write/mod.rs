//! Write-path orchestration (§4.5, C6): chunk, resolve, persist,
//! record provenance.

mod memory_writer;

pub use memory_writer::{MemoryWriter, WriteMetadata, WriteResult};
