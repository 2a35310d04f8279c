//! Retrying executor
//!
//! Re-invokes an operation while its failures are classified as transient,
//! sleeping `base_delay * 2^n` before retry `n`.

use std::future::Future;

use tracing::{debug, warn};

use super::RetryPolicy;
use crate::error::{RequestError, Result};

// == Retry Executor ==
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    // == Execute ==
    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent.
    ///
    /// A transient failure that outlives the budget surfaces as
    /// `ExhaustedRetries` wrapping the last failure. With retries disabled
    /// the first failure is returned as is.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<RequestError>,
    {
        let mut retry = 0u32;

        loop {
            let err: RequestError = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err.into(),
            };

            if !self.policy.enabled || !err.is_retryable() {
                debug!(error = %err, "not retrying");
                return Err(err);
            }

            if retry >= self.policy.max_retries {
                if retry == 0 {
                    return Err(err);
                }
                warn!(attempts = retry + 1, error = %err, "retries exhausted");
                return Err(RequestError::ExhaustedRetries {
                    attempts: retry + 1,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_for(retry);
            warn!(
                retry = retry + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
