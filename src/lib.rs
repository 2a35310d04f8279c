//! Request Cache - client-side caching and resilience for async API calls
//!
//! Provides TTL + LRU response caching, de-duplication of in-flight reads,
//! retries with exponential backoff, paced batching and invalidation of
//! cached reads after successful writes.

pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod inflight;
pub mod models;
pub mod monitor;
pub mod retry;
pub mod tasks;
pub mod transport;

pub use batch::{BatchQueue, BatchStats};
pub use cache::{CacheStats, EntryStore, Memoized};
pub use client::{InvalidationRule, RequestClient, RequestContext};
pub use config::{ClientSettings, Config};
pub use error::{RequestError, Result};
pub use inflight::PendingCalls;
pub use models::{Method, PerformanceReport, RequestOptions, TransportRequest};
pub use retry::{RetryExecutor, RetryPolicy};
pub use tasks::spawn_cleanup_task;
pub use transport::{Transport, TransportError};
