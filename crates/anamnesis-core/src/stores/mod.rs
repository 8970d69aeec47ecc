//! Store contracts (§6.1) — the three external collaborators the write
//! and read paths depend on.
//!
//! Each is a **bounded variant**: a fixed operation set expressed as an
//! `async_trait`, not an open-ended interface additional backends grow
//! methods onto (§9, "Polymorphism"). [`reference`] ships one
//! in-process implementation of each so the rest of the crate is
//! runnable without an external backend; they are illustrative, not a
//! performance claim, and any real deployment is expected to supply its
//! own.

mod graph_store;
mod reference;
mod search_index;
mod vector_store;

pub use graph_store::{Direction, GraphStore, GraphStoreError, NeighborQuery};
pub use reference::{InMemoryGraphStore, InMemorySearchIndex, InMemoryVectorStore};
pub use search_index::{IndexedDoc, SearchHit, SearchIndex, SearchIndexError, SearchQueryOpts};
pub use vector_store::{VectorHit, VectorStore, VectorStoreError};
