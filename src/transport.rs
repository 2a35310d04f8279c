//! Transport Module
//!
//! The boundary to whatever actually performs HTTP calls. The cache layer
//! treats a transport as an opaque async capability.

use async_trait::async_trait;
use serde_json::Value;

use crate::models::TransportRequest;

// == Transport Error ==
/// Failure reported by a transport.
///
/// `status` is `None` when no response was received at all.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    /// HTTP status of the failed response
    pub status: Option<u16>,
    /// Response body, or a message for network failures
    pub data: Value,
}

impl TransportError {
    /// Creates an error for a call that never produced a response.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            data: Value::String(message.into()),
        }
    }

    /// Creates an error for a non-success response.
    pub fn status(status: u16, data: Value) -> Self {
        Self {
            status: Some(status),
            data,
        }
    }

    /// Best-effort human readable message extracted from the payload.
    pub fn message(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            Value::Object(map) => ["error", "message", "detail"]
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| self.data.to_string()),
            Value::Null => match self.status {
                Some(status) => format!("request failed with status {}", status),
                None => "no response".to_string(),
            },
            other => other.to_string(),
        }
    }
}

// == Transport Trait ==
/// Performs a single request against the remote API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: &TransportRequest) -> std::result::Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_string() {
        assert_eq!(TransportError::network("timeout").message(), "timeout");
    }

    #[test]
    fn test_message_from_object_field() {
        let err = TransportError::status(400, json!({"message": "missing currency"}));
        assert_eq!(err.message(), "missing currency");
    }

    #[test]
    fn test_message_from_null_payload() {
        let err = TransportError::status(503, Value::Null);
        assert_eq!(err.message(), "request failed with status 503");
    }
}
