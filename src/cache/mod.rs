//! Cache Module
//!
//! In-memory entry store with TTL expiration and LRU eviction, plus a
//! memoizing wrapper for arbitrary async operations.

mod entry;
mod lru;
mod memoize;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use memoize::Memoized;
pub use stats::CacheStats;
pub use store::EntryStore;

// == Public Constants ==
/// Default store capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// Default entry lifetime (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
