//! Entry Store Module
//!
//! Bounded key -> value map with per-entry expiry and strict LRU eviction.
//! Purely synchronous; callers that share a store wrap it in a lock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::error::{RequestError, Result};

// == Entry Store ==
#[derive(Debug)]
pub struct EntryStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
    /// TTL used when `set` is called without one
    default_ttl: Duration,
}

impl<V: Clone> EntryStore<V> {
    // == Constructor ==
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity,
            default_ttl,
        }
    }

    // == Set ==
    /// Stores a value, replacing any previous value and expiry for `key`.
    ///
    /// If `key` is new and the store is full, the least recently used entry
    /// is evicted first.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(RequestError::InvalidRequest(
                "Cache key cannot be empty".to_string(),
            ));
        }

        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.capacity {
            match self.lru.evict_oldest() {
                Some(evicted_key) => {
                    self.entries.remove(&evicted_key);
                    self.stats.record_eviction();
                    tracing::debug!(key = %evicted_key, "evicted least recently used entry");
                }
                None => {
                    return Err(RequestError::CacheFull(format!(
                        "Cannot store '{}' in a store with capacity {}",
                        key, self.capacity
                    )));
                }
            }
        }

        let entry = CacheEntry::new(value, ttl.unwrap_or(self.default_ttl));
        self.lru.touch(&key);
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// A hit refreshes the key's LRU position. An expired entry is removed.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Delete ==
    /// Removes an entry. Returns true if something was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    // == Remove Matching ==
    /// Removes every entry whose key satisfies `predicate`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_matching<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&str) -> bool,
    {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| predicate(key.as_str()))
            .cloned()
            .collect();

        for key in &doomed {
            self.remove_entry(key);
        }
        self.stats.record_invalidations(doomed.len());
        doomed.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }
        self.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    // == Keys ==
    /// Stored keys, most recently used first. May include entries that have
    /// expired but were not yet purged.
    pub fn keys(&self) -> Vec<String> {
        self.lru.keys_by_recency()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}
