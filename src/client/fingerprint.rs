//! Request fingerprints
//!
//! A fingerprint identifies "the same logical request": method, normalized
//! path and canonical (key-sorted) parameters. It doubles as the entry store
//! key, formatted as `METHOD /path [params] [body]`.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

use crate::error::Result;
use crate::models::{Method, TransportRequest};

// == Path Normalization ==
/// Ensures a leading slash, collapses repeated slashes, drops a trailing
/// slash and escapes spaces. Query pairs are sorted by name; values of a
/// repeated name keep their order.
pub fn normalize_path(path: &str) -> String {
    let (base, query) = match path.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (path, None),
    };

    let segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    let mut normalized = format!("/{}", segments.join("/")).replace(' ', "%20");
    if let Some(query) = query {
        let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        pairs.sort_by_key(|pair| {
            let pair: &str = *pair;
            pair.split_once('=').map_or(pair, |(name, _)| name)
        });
        if !pairs.is_empty() {
            normalized.push('?');
            normalized.push_str(&pairs.join("&").replace(' ', "%20"));
        }
    }
    normalized
}

// == Canonical JSON ==
/// Serializes a JSON value with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&Canonical(value))?)
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Canonical<'_>> =
                    map.iter().map(|(k, v)| (k, Canonical(v))).collect();
                serializer.collect_map(sorted)
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Canonical(item))?;
                }
                seq.end()
            }
            other => other.serialize(serializer),
        }
    }
}

// == Request Key ==
/// Structured form of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    path: String,
    params: Option<String>,
    body: Option<String>,
}

impl RequestKey {
    pub fn from_request(request: &TransportRequest) -> Result<Self> {
        let params = if request.params.is_empty() {
            None
        } else {
            let map: serde_json::Map<String, Value> = request
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Some(canonical_json(&Value::Object(map))?)
        };
        let body = request.body.as_ref().map(canonical_json).transpose()?;

        Ok(Self {
            method: request.method,
            path: normalize_path(&request.path),
            params,
            body,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Normalized path, including any query suffix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extracts the path portion from a formatted fingerprint.
    pub fn path_of(key: &str) -> Option<&str> {
        key.split(' ').nth(1)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(params) = &self.params {
            write!(f, " {}", params)?;
        }
        if let Some(body) = &self.body {
            write!(f, " {}", body)?;
        }
        Ok(())
    }
}
