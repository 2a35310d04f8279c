//! Configuration Module
//!
//! Handles loading request cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL_MS};
use crate::client::InvalidationRule;
use crate::error::{RequestError, Result};
use crate::monitor::DEFAULT_MAX_RECORDS;
use crate::retry::RetryPolicy;

/// Per-client behavior. Every flag can still be overridden per call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Serve reads from the entry store
    pub enable_cache: bool,
    /// TTL in milliseconds for cached reads without an explicit TTL
    pub default_cache_ttl_ms: u64,
    /// Retry transient failures
    pub enable_retry: bool,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay in milliseconds before the first retry
    pub retry_delay_ms: u64,
    /// Backoff jitter factor, 0.0 disables jitter
    pub retry_jitter: f64,
    /// Route `batched` operations through the batch queue
    pub enable_batch: bool,
    /// Record marks and measures for each call
    pub enable_performance_monitoring: bool,
    /// How writes select cached reads to drop
    pub invalidation: InvalidationRule,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            enable_cache: true,
            default_cache_ttl_ms: DEFAULT_TTL_MS,
            enable_retry: true,
            max_retries: 3,
            retry_delay_ms: 1000,
            retry_jitter: 0.0,
            enable_batch: true,
            enable_performance_monitoring: false,
            invalidation: InvalidationRule::Substring,
        }
    }
}

impl ClientSettings {
    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.default_cache_ttl_ms)
    }

    /// Retry policy for a call, honoring a per-call override.
    pub fn retry_policy(&self, retry_override: Option<bool>) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
            .with_jitter(self.retry_jitter)
            .with_enabled(retry_override.unwrap_or(self.enable_retry))
    }
}

/// Shared context configuration plus default client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum number of entries the entry store can hold
    pub max_entries: usize,
    /// Store-level default TTL in milliseconds
    pub default_ttl_ms: u64,
    /// Background expiry sweep interval in seconds, 0 = lazy expiry only
    pub cleanup_interval_secs: u64,
    /// Maximum operations per batch group
    pub batch_size: usize,
    /// Pause in milliseconds between batch groups
    pub batch_delay_ms: u64,
    /// Marks and measures kept by the performance monitor
    pub monitor_max_records: usize,
    pub client: ClientSettings,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Entry store capacity (default: 100)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in ms (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL_SECS` - Expiry sweep interval (default: 0, disabled)
    /// - `BATCH_SIZE` - Operations per batch group (default: 10)
    /// - `BATCH_DELAY_MS` - Pause between batch groups (default: 100)
    /// - `MONITOR_MAX_RECORDS` - Monitor history size (default: 1000)
    /// - `ENABLE_CACHE`, `ENABLE_RETRY`, `ENABLE_BATCH`,
    ///   `ENABLE_PERFORMANCE_MONITORING` - client flags
    /// - `MAX_RETRIES` (default: 3), `RETRY_DELAY_MS` (default: 1000),
    ///   `RETRY_JITTER` (default: 0.0)
    /// - `CACHE_INVALIDATION` - `substring` or `segment` (default: substring)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let client = defaults.client.clone();

        Self {
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            default_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            cleanup_interval_secs: env_or(
                "CACHE_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            ),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size),
            batch_delay_ms: env_or("BATCH_DELAY_MS", defaults.batch_delay_ms),
            monitor_max_records: env_or("MONITOR_MAX_RECORDS", defaults.monitor_max_records),
            client: ClientSettings {
                enable_cache: env_or("ENABLE_CACHE", client.enable_cache),
                default_cache_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", client.default_cache_ttl_ms),
                enable_retry: env_or("ENABLE_RETRY", client.enable_retry),
                max_retries: env_or("MAX_RETRIES", client.max_retries),
                retry_delay_ms: env_or("RETRY_DELAY_MS", client.retry_delay_ms),
                retry_jitter: env_or("RETRY_JITTER", client.retry_jitter),
                enable_batch: env_or("ENABLE_BATCH", client.enable_batch),
                enable_performance_monitoring: env_or(
                    "ENABLE_PERFORMANCE_MONITORING",
                    client.enable_performance_monitoring,
                ),
                invalidation: env_or("CACHE_INVALIDATION", client.invalidation),
            },
        }
    }

    /// Rejects values the components cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(RequestError::InvalidConfig(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RequestError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.client.retry_jitter) {
            return Err(RequestError::InvalidConfig(
                "retry_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// `None` when the background sweep is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CAPACITY,
            default_ttl_ms: DEFAULT_TTL_MS,
            cleanup_interval_secs: 0,
            batch_size: 10,
            batch_delay_ms: 100,
            monitor_max_records: DEFAULT_MAX_RECORDS,
            client: ClientSettings::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
