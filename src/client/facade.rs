//! Cache-aware request façade
//!
//! Reads go entry store -> pending-call registry -> retrying executor ->
//! transport, and populate the store on success. Writes always hit the
//! transport through the retrying executor and, once they succeed, drop
//! every cached read their path may have made stale.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{normalize_path, RequestContext, RequestKey};
use crate::config::ClientSettings;
use crate::error::Result;
use crate::models::{CacheSnapshot, Method, PerformanceReport, RequestOptions, TransportRequest};
use crate::monitor::MeasureToken;
use crate::retry::RetryExecutor;
use crate::transport::Transport;

// == Request Client ==
/// Cheap to clone; clones share the context and transport.
#[derive(Clone)]
pub struct RequestClient {
    context: Arc<RequestContext>,
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
}

impl RequestClient {
    pub fn new(
        context: Arc<RequestContext>,
        transport: Arc<dyn Transport>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            context,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }

    // == Get ==
    /// Cached, de-duplicated and retried read.
    ///
    /// Concurrent reads with the same fingerprint share one transport call
    /// and its outcome, whether or not they use the cache. Each caller then
    /// caches the value under its own options.
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let request = TransportRequest::new(Method::Get, normalize_path(path))
            .with_params(options.params.clone());
        let key = RequestKey::from_request(&request)?.to_string();
        let use_cache = options.cache.unwrap_or(self.settings.enable_cache);
        let token = self.start_measure(&key);

        if use_cache {
            let hit = self.context.cache().write().await.get(&key);
            if let Some(value) = hit {
                debug!(key = %key, "cache hit");
                self.finish_measure(token);
                return Ok(value);
            }
            debug!(key = %key, "cache miss");
        }

        let generation = self.context.generation();
        let executor = RetryExecutor::new(self.settings.retry_policy(options.retry));
        let transport = Arc::clone(&self.transport);

        let result = self
            .context
            .pending()
            .run_exclusive(&key, move || async move {
                executor.execute(|| transport.call(&request)).await
            })
            .await;

        // Every caller, joined or not, stores under its own cache options
        if let (true, Ok(value)) = (use_cache, &result) {
            let ttl = options
                .cache_ttl
                .unwrap_or_else(|| self.settings.default_cache_ttl());
            if let Err(err) = self
                .context
                .store_if_current(generation, &key, value.clone(), ttl)
                .await
            {
                warn!(error = %err, "failed to cache response");
            }
        }

        self.finish_measure(token);
        result
    }

    // == Writes ==
    pub async fn post(&self, path: &str, body: Value, options: RequestOptions) -> Result<Value> {
        self.mutate(Method::Post, path, Some(body), options).await
    }

    pub async fn put(&self, path: &str, body: Value, options: RequestOptions) -> Result<Value> {
        self.mutate(Method::Put, path, Some(body), options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value> {
        self.mutate(Method::Delete, path, None, options).await
    }

    async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let path = normalize_path(path);
        let mut request =
            TransportRequest::new(method, path.clone()).with_params(options.params.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let token = self.start_measure(&format!("{} {}", method, path));
        let executor = RetryExecutor::new(self.settings.retry_policy(options.retry));
        let transport = &self.transport;
        let result = executor.execute(|| transport.call(&request)).await;
        self.finish_measure(token);

        // A failed write changed nothing, so nothing is invalidated
        let value = result?;

        if options.invalidate_cache.unwrap_or(true) {
            let mut removed = self.invalidate(&path).await;
            for extra in &options.also_invalidate {
                removed += self.invalidate(extra).await;
            }
            debug!(method = %method, path = %path, removed, "write invalidation done");
        }
        Ok(value)
    }

    // == Invalidate ==
    /// Drops every cached read whose path matches `path` under the client's
    /// invalidation rule. Returns the number of entries removed.
    pub async fn invalidate(&self, path: &str) -> usize {
        let written = normalize_path(path);
        let rule = self.settings.invalidation;

        let removed = self.context.cache().write().await.remove_matching(|key| {
            RequestKey::path_of(key).is_some_and(|cached| rule.matches(cached, &written))
        });
        if removed > 0 {
            info!(path = %written, rule = %rule, removed, "invalidated cached reads");
        }
        removed
    }

    pub async fn clear_cache(&self) {
        self.context.clear_cache().await;
    }

    // == Batched ==
    /// Runs `operation` through the shared batch queue, or directly when
    /// batching is disabled.
    ///
    /// Queued operations are enqueued before this returns.
    pub fn batched<T, F, Fut>(&self, operation: F) -> BoxFuture<'static, Result<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.settings.enable_batch {
            self.context.batch().submit(operation).boxed()
        } else {
            operation().boxed()
        }
    }

    // == Performance Report ==
    pub async fn performance_report(&self) -> PerformanceReport {
        let cache = {
            let store = self.context.cache().read().await;
            CacheSnapshot::new(store.capacity(), store.keys(), store.stats())
        };
        let monitor = self.context.monitor();

        PerformanceReport::new(
            monitor.marks(),
            monitor.measures(),
            cache,
            self.context.pending().len(),
        )
    }

    fn start_measure(&self, name: &str) -> Option<MeasureToken> {
        self.settings
            .enable_performance_monitoring
            .then(|| self.context.monitor().start(name))
    }

    fn finish_measure(&self, token: Option<MeasureToken>) {
        if let Some(token) = token {
            self.context.monitor().finish(&token);
        }
    }
}
