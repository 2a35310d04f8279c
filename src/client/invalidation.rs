//! Cache invalidation rules
//!
//! Decides whether a cached read may reflect state changed by a write.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

// == Invalidation Rule ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationRule {
    /// Cached path contains the written path anywhere. Broad: a write to
    /// `/rates/1` also drops `/rates/10`.
    #[default]
    Substring,
    /// Cached path starts with all segments of the written path.
    SegmentPrefix,
}

impl InvalidationRule {
    // == Matches ==
    /// Returns true if a cached read of `cached_path` must be dropped after a
    /// successful write to `write_path`. Query strings are ignored on both.
    pub fn matches(&self, cached_path: &str, write_path: &str) -> bool {
        let cached = base_path(cached_path);
        let written = base_path(write_path);

        match self {
            InvalidationRule::Substring => cached.contains(written),
            InvalidationRule::SegmentPrefix => {
                let mut cached_segments = segments(cached);
                segments(written).all(|segment| cached_segments.next() == Some(segment))
            }
        }
    }
}

impl FromStr for InvalidationRule {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(InvalidationRule::Substring),
            "segment" | "segment_prefix" => Ok(InvalidationRule::SegmentPrefix),
            other => Err(RequestError::InvalidConfig(format!(
                "unknown invalidation rule '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for InvalidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationRule::Substring => f.write_str("substring"),
            InvalidationRule::SegmentPrefix => f.write_str("segment_prefix"),
        }
    }
}

/// Path portion before any query string.
pub fn base_path(path: &str) -> &str {
    path.split_once('?').map_or(path, |(base, _)| base)
}

/// Non-empty path segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
