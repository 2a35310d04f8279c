//! Batch Queue
//!
//! Accepts independent async operations and runs them in groups of at most
//! `batch_size`, separated by `inter_batch_delay`. Every operation settles
//! its own caller; a failing operation never affects its siblings.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{RequestError, Result};

/// A queued operation. Calling it launches the operation and yields a future
/// that settles the submitter.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

// == Batch Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Operations whose group could not be launched or that panicked
    pub aborted: u64,
    /// Groups run so far
    pub groups: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
    groups: AtomicU64,
}

struct Inner {
    queue: Mutex<VecDeque<Job>>,
    /// Set while a processing loop is running
    processing: AtomicBool,
    batch_size: usize,
    inter_batch_delay: Duration,
    counters: Arc<Counters>,
}

// == Batch Queue ==
#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<Inner>,
}

impl BatchQueue {
    /// Creates a queue. A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize, inter_batch_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                batch_size: batch_size.max(1),
                inter_batch_delay,
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    // == Submit ==
    /// Enqueues `operation` immediately and returns a future for its result.
    ///
    /// The operation is appended when `submit` is called, not when the
    /// returned future is first polled, so a loop of submissions keeps its
    /// FIFO order. Must be called from within a tokio runtime.
    pub fn submit<T, F, Fut>(&self, operation: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let counters = Arc::clone(&self.inner.counters);

        let job: Job = Box::new(move || {
            let pending = operation();
            async move {
                let outcome = pending.await;
                match &outcome {
                    Ok(_) => counters.completed.fetch_add(1, Ordering::Relaxed),
                    Err(err) => {
                        warn!(error = %err, "batch operation failed");
                        counters.failed.fetch_add(1, Ordering::Relaxed)
                    }
                };
                // The submitter may have stopped waiting
                let _ = tx.send(outcome);
            }
            .boxed()
        });

        lock(&self.inner.queue).push_back(job);
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Inner::ensure_processing(&self.inner);

        let counters = Arc::clone(&self.inner.counters);
        async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => {
                    counters.aborted.fetch_add(1, Ordering::Relaxed);
                    Err(RequestError::BatchAborted)
                }
            }
        }
    }

    /// Operations waiting for a group.
    pub fn len(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.queue).is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::Acquire)
    }

    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    pub fn inter_batch_delay(&self) -> Duration {
        self.inner.inter_batch_delay
    }

    pub fn stats(&self) -> BatchStats {
        let c = &self.inner.counters;
        BatchStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            aborted: c.aborted.load(Ordering::Relaxed),
            groups: c.groups.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn ensure_processing(inner: &Arc<Inner>) {
        if inner.processing.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(inner);
        tokio::spawn(async move { inner.process().await });
    }

    // == Processing Loop ==
    async fn process(self: Arc<Self>) {
        loop {
            let group = self.take_group();

            if group.is_empty() {
                self.processing.store(false, Ordering::Release);
                // A submission may have slipped in before the flag dropped
                let idle = lock(&self.queue).is_empty();
                if idle || self.processing.swap(true, Ordering::AcqRel) {
                    break;
                }
                continue;
            }

            self.run_group(group).await;

            let more_waiting = !lock(&self.queue).is_empty();
            if more_waiting {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }
    }

    fn take_group(&self) -> Vec<Job> {
        let mut queue = lock(&self.queue);
        let size = queue.len().min(self.batch_size);
        queue.drain(..size).collect()
    }

    async fn run_group(&self, group: Vec<Job>) {
        let size = group.len();
        self.counters.groups.fetch_add(1, Ordering::Relaxed);
        debug!(size, "running batch group");

        // Launching calls each operation's factory synchronously. If one of
        // them panics, the whole group is dropped unstarted and every
        // submitter in it sees BatchAborted.
        let launched = catch_unwind(AssertUnwindSafe(|| {
            group.into_iter().map(|job| job()).collect::<Vec<_>>()
        }));

        let pending = match launched {
            Ok(pending) => pending,
            Err(_) => {
                warn!(size, "batch group failed to launch, rejecting its operations");
                return;
            }
        };

        let handles: Vec<_> = pending.into_iter().map(tokio::spawn).collect();
        for joined in join_all(handles).await {
            if let Err(err) = joined {
                warn!(error = %err, "batch operation did not complete");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
