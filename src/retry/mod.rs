//! Retry Module
//!
//! Bounded retries with exponential backoff for transient transport failures.

mod executor;
mod policy;

pub use executor::RetryExecutor;
pub use policy::RetryPolicy;
