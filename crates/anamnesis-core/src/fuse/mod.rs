//! Reciprocal-rank fusion across retriever outputs (§4.11, C12).

mod result_fuser;

pub use result_fuser::{FusedResult, FusionInput, FusionItem, FusionStats, ResultFuser};
