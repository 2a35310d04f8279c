//! Diagnostics models
//!
//! Snapshots exported for external logging or telemetry. Nothing in the
//! crate interprets them.

use serde::Serialize;

use crate::cache::CacheStats;

/// A named point in time, relative to when the monitor was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub name: String,
    pub offset_ms: u64,
}

/// A named duration between two marks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureRecord {
    pub name: String,
    pub start_mark: String,
    pub end_mark: String,
    pub duration_ms: u64,
}

/// Entry store portion of the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    /// Current number of stored entries
    pub size: usize,
    /// Store capacity
    pub max_size: usize,
    /// Stored keys, most recently used first
    pub keys: Vec<String>,
    pub stats: CacheStats,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl CacheSnapshot {
    pub fn new(max_size: usize, keys: Vec<String>, stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            size: keys.len(),
            max_size,
            keys,
            stats,
            hit_rate,
        }
    }
}

/// Full diagnostics snapshot for one client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// RFC 3339 timestamp of when the snapshot was taken
    pub generated_at: String,
    pub marks: Vec<MarkRecord>,
    pub measures: Vec<MeasureRecord>,
    pub cache: CacheSnapshot,
    /// In-flight calls at snapshot time
    pub pending_requests: usize,
}

impl PerformanceReport {
    pub fn new(
        marks: Vec<MarkRecord>,
        measures: Vec<MeasureRecord>,
        cache: CacheSnapshot,
        pending_requests: usize,
    ) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            marks,
            measures,
            cache,
            pending_requests,
        }
    }
}
