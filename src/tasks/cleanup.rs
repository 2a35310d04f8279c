//! Expiry Sweep Task
//!
//! Background task that periodically purges expired entries, complementing
//! the lazy expiry done on reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::EntryStore;

/// Spawns a task that purges expired entries every `interval`.
///
/// The task runs until the returned handle is aborted.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(EntryStore::<String>::new(100, Duration::from_secs(300))));
/// let cleanup_handle = spawn_cleanup_task(store.clone(), Duration::from_secs(30));
/// // Later, on teardown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(store: Arc<RwLock<EntryStore<V>>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut guard = store.write().await;
                guard.cleanup_expired()
            };

            if removed > 0 {
                info!("expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_store() -> Arc<RwLock<EntryStore<String>>> {
        Arc::new(RwLock::new(EntryStore::new(100, Duration::from_secs(300))))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = shared_store();
        store
            .write()
            .await
            .set("expire_soon", "value".to_string(), Some(Duration::from_secs(1)))
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        // Removed by the sweep, not by a lazy read
        assert!(!store.read().await.contains("expire_soon"));
        assert_eq!(store.read().await.stats().expirations, 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = shared_store();
        store
            .write()
            .await
            .set("long_lived", "value".to_string(), Some(Duration::from_secs(3600)))
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            store.write().await.get("long_lived"),
            Some("value".to_string())
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(shared_store(), Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
