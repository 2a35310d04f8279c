//! Request context
//!
//! Owns the state every client shares: the entry store, the pending-call
//! registry, the batch queue and the performance monitor. Built once at
//! startup and handed to clients explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::RequestClient;
use crate::batch::BatchQueue;
use crate::cache::EntryStore;
use crate::config::{ClientSettings, Config};
use crate::error::Result;
use crate::inflight::PendingCalls;
use crate::monitor::PerformanceMonitor;
use crate::tasks::spawn_cleanup_task;
use crate::transport::Transport;

/// Entry store shared by every client of a context.
pub type SharedStore = Arc<RwLock<EntryStore<Value>>>;

// == Request Context ==
pub struct RequestContext {
    config: Config,
    cache: SharedStore,
    pending: PendingCalls<Value>,
    batch: BatchQueue,
    monitor: PerformanceMonitor,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every cache reset; reads started under an older
    /// generation do not store their results.
    generation: AtomicU64,
}

impl RequestContext {
    // == Init ==
    /// Validates `config` and builds the shared state.
    ///
    /// Starts the expiry sweep when `cleanup_interval_secs` is non-zero, in
    /// which case this must be called from within a tokio runtime.
    pub fn init(config: &Config) -> Result<Arc<Self>> {
        config.validate()?;

        let cache: SharedStore = Arc::new(RwLock::new(EntryStore::new(
            config.max_entries,
            config.default_ttl(),
        )));
        let cleanup = config
            .cleanup_interval()
            .map(|interval| spawn_cleanup_task(Arc::clone(&cache), interval));

        info!(
            "Request context initialized: max_entries={}, default_ttl={}ms, batch_size={}, batch_delay={}ms",
            config.max_entries, config.default_ttl_ms, config.batch_size, config.batch_delay_ms
        );

        Ok(Arc::new(Self {
            config: config.clone(),
            cache,
            pending: PendingCalls::new(),
            batch: BatchQueue::new(config.batch_size, config.batch_delay()),
            monitor: PerformanceMonitor::new(config.monitor_max_records),
            cleanup: Mutex::new(cleanup),
            generation: AtomicU64::new(0),
        }))
    }

    /// Client using the context's default settings.
    pub fn client(self: &Arc<Self>, transport: Arc<dyn Transport>) -> RequestClient {
        self.client_with(transport, self.config.client.clone())
    }

    pub fn client_with(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        settings: ClientSettings,
    ) -> RequestClient {
        RequestClient::new(Arc::clone(self), transport, settings)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &SharedStore {
        &self.cache
    }

    pub fn pending(&self) -> &PendingCalls<Value> {
        &self.pending
    }

    pub fn batch(&self) -> &BatchQueue {
        &self.batch
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    // == Clear ==
    /// Drops all cached entries and monitor history, e.g. on logout.
    pub async fn clear(&self) {
        self.clear_cache().await;
        self.monitor.clear();
        info!("Request context cleared");
    }

    /// Drops all cached entries. Reads still in flight when this runs will
    /// not write their results back.
    pub async fn clear_cache(&self) {
        let mut store = self.cache.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        store.clear();
    }

    /// Current cache generation, see [`RequestContext::store_if_current`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Stores `value` unless the cache was reset since `generation` was read.
    ///
    /// Returns false when the value was discarded.
    pub async fn store_if_current(
        &self,
        generation: u64,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<bool> {
        let mut store = self.cache.write().await;
        if self.generation() != generation {
            debug!(key, "cache was reset during the read, discarding result");
            return Ok(false);
        }
        store.set(key, value, Some(ttl))?;
        Ok(true)
    }

    // == Teardown ==
    /// Clears all state and stops the expiry sweep.
    pub async fn teardown(&self) {
        self.stop_cleanup();
        self.clear().await;
        info!("Request context torn down");
    }

    fn stop_cleanup(&self) {
        let handle = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        self.stop_cleanup();
    }
}
