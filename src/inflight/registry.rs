//! Pending-Call Registry
//!
//! Maps a request fingerprint to the shared future of the call currently in
//! flight for it. Later callers with the same fingerprint await that future
//! instead of starting a new call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::{RequestError, Result};

type SharedCall<V> = Shared<BoxFuture<'static, Result<V>>>;
type CallMap<V> = Arc<Mutex<HashMap<String, SharedCall<V>>>>;

// == Pending Calls ==
/// Registry of in-flight calls keyed by fingerprint.
///
/// The map is only touched inside short synchronous critical sections, so a
/// std mutex is enough and the unregister step can run from `Drop`.
pub struct PendingCalls<V> {
    calls: CallMap<V>,
}

impl<V> Clone for PendingCalls<V> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<V> Default for PendingCalls<V> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> PendingCalls<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Run Exclusive ==
    /// Runs `factory` unless a call for `fingerprint` is already in flight,
    /// in which case the caller joins that call.
    ///
    /// The factory is invoked outside the registry lock, so it may use the
    /// registry itself. If another caller registers the same fingerprint
    /// meanwhile, the freshly built future is dropped unpolled and the caller
    /// joins the registered call.
    ///
    /// The underlying call is spawned, so it runs to completion even if every
    /// waiter goes away. The fingerprint is unregistered when the call
    /// settles, before any waiter observes the outcome.
    pub async fn run_exclusive<F, Fut>(&self, fingerprint: &str, factory: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let existing = lock(&self.calls).get(fingerprint).cloned();
        if let Some(existing) = existing {
            debug!(fingerprint, "joining in-flight call");
            return existing.await;
        }

        let operation = factory();

        let call = {
            let mut calls = lock(&self.calls);
            match calls.get(fingerprint) {
                Some(existing) => {
                    debug!(fingerprint, "call registered concurrently, joining it");
                    existing.clone()
                }
                None => {
                    let guard = Unregister {
                        calls: Arc::clone(&self.calls),
                        fingerprint: fingerprint.to_string(),
                    };
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        operation.await
                    });
                    let call = async move {
                        handle.await.unwrap_or_else(|err| {
                            Err(RequestError::Internal(format!(
                                "in-flight call did not complete: {}",
                                err
                            )))
                        })
                    }
                    .boxed()
                    .shared();

                    calls.insert(fingerprint.to_string(), call.clone());
                    call
                }
            }
        };

        call.await
    }

    /// Number of calls currently in flight.
    pub fn len(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.calls).is_empty()
    }

    pub fn is_pending(&self, fingerprint: &str) -> bool {
        lock(&self.calls).contains_key(fingerprint)
    }
}

// == Unregister Guard ==
/// Removes the fingerprint when the spawned call finishes or unwinds.
struct Unregister<V> {
    calls: CallMap<V>,
    fingerprint: String,
}

impl<V> Drop for Unregister<V> {
    fn drop(&mut self) {
        lock(&self.calls).remove(&self.fingerprint);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_call() {
        let registry: PendingCalls<String> = PendingCalls::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        let callers = (0..5).map(|_| {
            let invocations = Arc::clone(&invocations);
            registry.run_exclusive("GET /dashboard", move || {
                invocations.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("dashboard".to_string())
                }
            })
        });
        let results = join_all(callers).await;

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), "dashboard");
        }
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_waiter() {
        let registry: PendingCalls<u32> = PendingCalls::new();

        let callers = (0..3).map(|_| {
            registry.run_exclusive("GET /rates/all", || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(RequestError::Transient {
                    status: Some(503),
                    message: "unavailable".to_string(),
                })
            })
        });
        let results = join_all(callers).await;

        for result in results {
            assert_eq!(result.unwrap_err().status(), Some(503));
        }
        assert!(registry.is_empty(), "failed call must be unregistered");
    }

    #[tokio::test]
    async fn test_settled_call_is_not_reused() {
        let registry: PendingCalls<usize> = PendingCalls::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        for expected in 1..=2 {
            let counter = Arc::clone(&invocations);
            let value = registry
                .run_exclusive("GET /a", move || async move {
                    Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_fingerprints_run_independently() {
        let registry: PendingCalls<&'static str> = PendingCalls::new();

        let (a, b) = tokio::join!(
            registry.run_exclusive("GET /a", || async { Ok("a") }),
            registry.run_exclusive("GET /b", || async { Ok("b") }),
        );

        assert_eq!(a.unwrap(), "a");
        assert_eq!(b.unwrap(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_pending_while_in_flight() {
        let registry: PendingCalls<()> = PendingCalls::new();
        let background = registry.clone();

        let task = tokio::spawn(async move {
            background
                .run_exclusive("GET /slow", || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                })
                .await
        });

        tokio::task::yield_now().await;
        assert!(registry.is_pending("GET /slow"));
        assert_eq!(registry.len(), 1);

        task.await.unwrap().unwrap();
        assert!(!registry.is_pending("GET /slow"));
    }

    #[tokio::test]
    async fn test_factory_may_use_the_registry() {
        let registry: PendingCalls<bool> = PendingCalls::new();
        let inner = registry.clone();

        let value = registry
            .run_exclusive("GET /nested", move || {
                let seen_before_launch = inner.is_pending("GET /nested");
                async move { Ok(seen_before_launch) }
            })
            .await
            .unwrap();

        assert!(!value);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_call_is_unregistered() {
        let registry: PendingCalls<()> = PendingCalls::new();

        let result = registry
            .run_exclusive("GET /boom", || async {
                let exploded = true;
                if exploded {
                    panic!("transport exploded");
                }
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RequestError::Internal(_))));
        assert!(registry.is_empty());
    }
}
