//! Background Tasks Module
//!
//! # Tasks
//! - Expiry sweep: removes expired entries at a configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
