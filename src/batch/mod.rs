//! Batch Module
//!
//! Runs independent operations in paced FIFO groups.

mod queue;

pub use queue::{BatchQueue, BatchStats};
