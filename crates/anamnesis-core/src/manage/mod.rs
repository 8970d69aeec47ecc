//! The `manage` operation (§6.2, C16): pin, forget, decay and merge
//! memories already persisted by the write path.

mod memory_manager;

pub use memory_manager::{ManageOperation, ManageOptions, ManageOutcome, ManageResult, MemoryManager};
