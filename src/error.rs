//! Error types for the request cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::transport::TransportError;

// == Request Error Enum ==
/// Unified error type for cached and retried requests.
///
/// Cloneable so a single outcome can be handed to every caller that joined
/// the same in-flight call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// No response, 5xx, 408 or 429. Eligible for retry.
    #[error("Transient transport failure (status {status:?}): {message}")]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Any other non-success status. Never retried.
    #[error("Client error {status}: {message}")]
    Client {
        status: u16,
        message: String,
        data: serde_json::Value,
    },

    /// Retry budget consumed; carries the last transient failure
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        last: Box<RequestError>,
    },

    /// The batch group was dropped before this operation could settle
    #[error("Batch operation was dropped before it completed")]
    BatchAborted,

    /// Cache is full and eviction failed
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input could not be turned into a cache key
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RequestError {
    // == Is Retryable ==
    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RequestError::Transient { .. })
    }

    // == Status ==
    /// Returns the HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Transient { status, .. } => *status,
            RequestError::Client { status, .. } => Some(*status),
            RequestError::ExhaustedRetries { last, .. } => last.status(),
            _ => None,
        }
    }
}

// == Transport Classification ==
impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        let message = err.message();
        match err.status {
            None => RequestError::Transient {
                status: None,
                message,
            },
            Some(status) if status == 408 || status == 429 || (500..=599).contains(&status) => {
                RequestError::Transient {
                    status: Some(status),
                    message,
                }
            }
            Some(status) => RequestError::Client {
                status,
                message,
                data: err.data,
            },
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the request cache.
pub type Result<T> = std::result::Result<T, RequestError>;
