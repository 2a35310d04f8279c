//! Performance monitor
//!
//! Keeps a bounded history of named marks (points in time) and measures
//! (durations between two marks).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::models::{MarkRecord, MeasureRecord};

/// Default number of marks and measures kept.
pub const DEFAULT_MAX_RECORDS: usize = 1000;

#[derive(Debug, Default)]
struct History {
    marks: VecDeque<(String, Instant)>,
    measures: VecDeque<MeasureRecord>,
}

// == Performance Monitor ==
#[derive(Debug)]
pub struct PerformanceMonitor {
    origin: Instant,
    max_records: usize,
    next_id: AtomicU64,
    history: Mutex<History>,
}

/// Marks belonging to one timed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureToken {
    pub name: String,
    pub start_mark: String,
    pub end_mark: String,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS)
    }
}

impl PerformanceMonitor {
    pub fn new(max_records: usize) -> Self {
        Self {
            origin: Instant::now(),
            max_records: max_records.max(1),
            next_id: AtomicU64::new(0),
            history: Mutex::new(History::default()),
        }
    }

    // == Mark ==
    /// Records `name` at the current time. Oldest marks are dropped past
    /// the history limit.
    pub fn mark(&self, name: &str) {
        let mut history = self.history();
        if history.marks.len() >= self.max_records {
            history.marks.pop_front();
        }
        history.marks.push_back((name.to_string(), Instant::now()));
    }

    // == Measure ==
    /// Records the duration between the latest `start_mark` and the latest
    /// `end_mark`. Returns `None` if either mark is unknown.
    pub fn measure(&self, name: &str, start_mark: &str, end_mark: &str) -> Option<Duration> {
        let mut history = self.history();
        let find = |mark: &str| {
            history
                .marks
                .iter()
                .rev()
                .find(|(label, _)| label == mark)
                .map(|(_, at)| *at)
        };
        let duration = find(end_mark)?.saturating_duration_since(find(start_mark)?);

        if history.measures.len() >= self.max_records {
            history.measures.pop_front();
        }
        history.measures.push_back(MeasureRecord {
            name: name.to_string(),
            start_mark: start_mark.to_string(),
            end_mark: end_mark.to_string(),
            duration_ms: duration.as_millis() as u64,
        });
        trace!(name, duration_ms = duration.as_millis() as u64, "measured");
        Some(duration)
    }

    // == Start / Finish ==
    /// Marks the start of an operation under a unique pair of mark names.
    pub fn start(&self, name: &str) -> MeasureToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = MeasureToken {
            name: name.to_string(),
            start_mark: format!("{}#{}:start", name, id),
            end_mark: format!("{}#{}:end", name, id),
        };
        self.mark(&token.start_mark);
        token
    }

    /// Marks the end of an operation and records its measure.
    pub fn finish(&self, token: &MeasureToken) -> Option<Duration> {
        self.mark(&token.end_mark);
        self.measure(&token.name, &token.start_mark, &token.end_mark)
    }

    pub fn marks(&self) -> Vec<MarkRecord> {
        self.history()
            .marks
            .iter()
            .map(|(name, at)| MarkRecord {
                name: name.clone(),
                offset_ms: at.saturating_duration_since(self.origin).as_millis() as u64,
            })
            .collect()
    }

    pub fn measures(&self) -> Vec<MeasureRecord> {
        self.history().measures.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut history = self.history();
        history.marks.clear();
        history.measures.clear();
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_measure_between_marks() {
        let monitor = PerformanceMonitor::default();

        monitor.mark("fetch:start");
        tokio::time::advance(Duration::from_millis(250)).await;
        monitor.mark("fetch:end");

        let duration = monitor.measure("fetch", "fetch:start", "fetch:end");
        assert_eq!(duration, Some(Duration::from_millis(250)));

        let measures = monitor.measures();
        assert_eq!(measures.len(), 1);
        assert_eq!(measures[0].duration_ms, 250);

        let marks = monitor.marks();
        assert_eq!(marks[0].offset_ms, 0);
        assert_eq!(marks[1].offset_ms, 250);
    }

    #[test]
    fn test_measure_with_unknown_mark() {
        let monitor = PerformanceMonitor::default();
        monitor.mark("a");

        assert_eq!(monitor.measure("m", "a", "missing"), None);
        assert!(monitor.measures().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_finish_tokens_are_unique() {
        let monitor = PerformanceMonitor::default();

        let first = monitor.start("GET /rates/all");
        let second = monitor.start("GET /rates/all");
        assert_ne!(first.start_mark, second.start_mark);

        tokio::time::advance(Duration::from_millis(10)).await;
        monitor.finish(&second);
        tokio::time::advance(Duration::from_millis(10)).await;
        monitor.finish(&first);

        let durations: Vec<u64> = monitor.measures().iter().map(|m| m.duration_ms).collect();
        assert_eq!(durations, vec![10, 20]);
    }

    #[test]
    fn test_history_is_bounded() {
        let monitor = PerformanceMonitor::new(3);
        for i in 0..5 {
            monitor.mark(&format!("m{}", i));
        }

        let names: Vec<String> = monitor.marks().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_clear() {
        let monitor = PerformanceMonitor::default();
        let token = monitor.start("x");
        monitor.finish(&token);

        monitor.clear();

        assert!(monitor.marks().is_empty());
        assert!(monitor.measures().is_empty());
    }
}
