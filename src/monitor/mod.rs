//! Monitor Module
//!
//! Named marks and measures for diagnostics export.

mod performance;

pub use performance::{MeasureToken, PerformanceMonitor, DEFAULT_MAX_RECORDS};
