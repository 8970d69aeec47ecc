//! Query parsing and expansion (§4.6-4.7, C7/C8).

mod expander;
mod processor;

pub use expander::QueryExpander;
pub use processor::{ParsedQuery, ProcessedQuery, QueryProcessor, QueryType, TimeRange};
