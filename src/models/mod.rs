//! Request and report models
//!
//! Types that cross the boundary between callers, the transport and
//! external diagnostics.

pub mod report;
pub mod request;

// Re-export commonly used types
pub use report::{CacheSnapshot, MarkRecord, MeasureRecord, PerformanceReport};
pub use request::{Method, RequestOptions, TransportRequest};
