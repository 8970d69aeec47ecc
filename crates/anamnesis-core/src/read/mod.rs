//! The read path (§4.13, C14): parse+expand, fan out to the three
//! retrievers, fuse, rank, and assemble the response envelope.

mod memory_reader;

pub use memory_reader::{
    CommunityCard, ConflictInfo, Evidence, MemoryReader, RecallArgs, RecallResult, RetrievalStats,
};
