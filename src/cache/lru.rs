//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with a strictly increasing sequence number, so
/// the smallest stamp is always the least recently used key and keys touched
/// in the same instant are still ordered by touch order.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Key -> last access stamp
    stamps: HashMap<String, u64>,
    /// Access stamp -> key, oldest first
    order: BTreeMap<u64, String>,
    /// Next stamp to hand out
    next_stamp: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        match self.stamps.get_mut(key) {
            Some(previous) => {
                self.order.remove(previous);
                *previous = stamp;
            }
            None => {
                self.stamps.insert(key.to_string(), stamp);
            }
        }
        self.order.insert(stamp, key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    /// Keys ordered from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.order.values().rev().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_insertion_order_breaks_ties() {
        let mut lru = LruTracker::new();

        lru.touch("GET /a");
        lru.touch("GET /b");
        lru.touch("GET /c");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&"GET /a".to_string()));
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        lru.touch("a");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.keys_by_recency(), vec!["a", "c", "b"]);
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
        assert_eq!(lru.evict_oldest(), Some("c".to_string()));
        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.remove("a");
        lru.remove("missing");

        assert_eq!(lru.len(), 1);
        assert!(!lru.contains("a"));
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
    }

    #[test]
    fn test_lru_repeated_touch_keeps_single_entry() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("a");
        lru.touch("a");

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.keys_by_recency(), vec!["a"]);
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("b");
        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.evict_oldest(), None);
    }
}
