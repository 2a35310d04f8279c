//! Memoizing wrapper
//!
//! Caches the results of an arbitrary async function keyed by the canonical
//! JSON of its input, with the same TTL, LRU and de-duplication behavior as
//! cached requests.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheStats, EntryStore};
use crate::client::canonical_json;
use crate::error::Result;
use crate::inflight::PendingCalls;

// == Memoized ==
/// An async function `I -> Result<O>` with a result cache in front of it.
///
/// Failures are never cached.
pub struct Memoized<I, O, F> {
    func: Arc<F>,
    store: Arc<RwLock<EntryStore<O>>>,
    pending: PendingCalls<O>,
    ttl: Duration,
    _input: PhantomData<fn(I)>,
}

impl<I, O, F, Fut> Memoized<I, O, F>
where
    I: Serialize + Send + 'static,
    O: Clone + Send + Sync + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    pub fn new(func: F, capacity: usize, ttl: Duration) -> Self {
        Self {
            func: Arc::new(func),
            store: Arc::new(RwLock::new(EntryStore::new(capacity, ttl))),
            pending: PendingCalls::new(),
            ttl,
            _input: PhantomData,
        }
    }

    // == Call ==
    /// Returns the cached result for `input`, or runs the function once for
    /// all concurrent callers with an equal input.
    pub async fn call(&self, input: I) -> Result<O> {
        let key = Self::key(&input)?;

        if let Some(hit) = self.store.write().await.get(&key) {
            debug!(key = %key, "memoized hit");
            return Ok(hit);
        }

        let func = Arc::clone(&self.func);
        let store = Arc::clone(&self.store);
        let ttl = self.ttl;
        let store_key = key.clone();
        // The function itself runs inside the in-flight call, never while
        // the registry is being updated
        self.pending
            .run_exclusive(&key, move || async move {
                let value = func(input).await?;
                store.write().await.set(store_key, value.clone(), Some(ttl))?;
                Ok(value)
            })
            .await
    }

    /// Drops the cached result for `input`. Returns true if one existed.
    pub async fn invalidate(&self, input: &I) -> Result<bool> {
        let key = Self::key(input)?;
        Ok(self.store.write().await.delete(&key))
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    fn key(input: &I) -> Result<String> {
        canonical_json(&serde_json::to_value(input)?)
    }
}
