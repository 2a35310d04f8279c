//! Request models
//!
//! Describes what a caller asks for and what is handed to the transport.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Method ==
/// HTTP method of a logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns true for methods whose success must invalidate cached reads.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Method::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Transport Request ==
/// A single call as handed to the transport.
///
/// `params` is a `BTreeMap` so that iteration (and therefore the
/// fingerprint) is independent of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub params: BTreeMap<String, Value>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

// == Request Options ==
/// Per-call overrides. Unset fields fall back to the client settings.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters
    pub params: BTreeMap<String, Value>,
    /// Read from and populate the cache (reads only)
    pub cache: Option<bool>,
    /// TTL for the cached result
    pub cache_ttl: Option<Duration>,
    /// Retry transient failures
    pub retry: Option<bool>,
    /// Invalidate matching cached reads after a successful write
    pub invalidate_cache: Option<bool>,
    /// Extra paths to invalidate after a successful write
    pub also_invalidate: Vec<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn retry(mut self, enabled: bool) -> Self {
        self.retry = Some(enabled);
        self
    }

    pub fn invalidate_cache(mut self, enabled: bool) -> Self {
        self.invalidate_cache = Some(enabled);
        self
    }

    pub fn also_invalidate(mut self, path: impl Into<String>) -> Self {
        self.also_invalidate.push(path.into());
        self
    }
}
