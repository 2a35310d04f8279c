//! Client Module
//!
//! The cache-aware request façade, the context it runs in, and the key and
//! invalidation logic it relies on.

mod context;
mod facade;
mod fingerprint;
mod invalidation;

pub use context::{RequestContext, SharedStore};
pub use facade::RequestClient;
pub use fingerprint::{canonical_json, normalize_path, RequestKey};
pub use invalidation::InvalidationRule;
