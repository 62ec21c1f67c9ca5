//! Error types for the chain RPC client (§4.1).
//!
//! Mirrors the error taxonomy an upstream EVM-compatible JSON-RPC endpoint
//! can return: transport failures, malformed envelopes, and per-item
//! JSON-RPC error objects.

use thiserror::Error;

use crate::error::ErrorPolicy;

/// Result type alias using [`RpcError`].
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors that can occur when calling the upstream chain RPC endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RpcError {
    /// Failed to establish a connection to the RPC endpoint.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request timed out waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// HTTP-level error (non-2xx status, TLS failure, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A single item in a batch request returned a JSON-RPC error object.
    #[error("RPC error ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable error message from the server.
        message: String,
        /// Optional additional data from the error response.
        data: Option<String>,
    },

    /// Response body was valid JSON but did not match the expected shape,
    /// or a batch response came back with a different length or id set
    /// than the request (§8 boundary case: misaligned batch response).
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to serialize a request or deserialize a response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RpcError {
    /// Build an RPC error from a JSON-RPC error code and message.
    #[must_use]
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc { code, message: message.into(), data: None }
    }

    /// Classify this error for the engine's retry policy (§7).
    ///
    /// Transport-level failures are indefinitely retryable: the Ingestor
    /// backs off and tries the same request again. A per-item JSON-RPC
    /// error means the endpoint understood and rejected the request, so
    /// retrying the same call would just fail again; the engine skips
    /// that item instead.
    #[must_use]
    pub const fn policy(&self) -> ErrorPolicy {
        match self {
            Self::Connection(_) | Self::Timeout | Self::Http(_) => ErrorPolicy::RetryIndefinitely,
            Self::Rpc { .. } | Self::InvalidResponse(_) | Self::Serialization(_) => ErrorPolicy::SkipItem,
        }
    }

    /// True if this error indicates the endpoint doesn't implement the
    /// called method at all (standard JSON-RPC `-32601`, or `-32600` which
    /// some providers use interchangeably for unsupported methods).
    #[must_use]
    pub const fn is_method_not_supported(&self) -> bool {
        matches!(self, Self::Rpc { code: -32601 | -32600, .. })
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_request() || err.is_body() || err.is_decode() {
            Self::Http(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Detailed information from a single JSON-RPC error response.
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct RpcErrorDetail {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl RpcErrorDetail {
    pub fn into_error(self) -> RpcError {
        RpcError::Rpc { code: self.code, message: self.message, data: self.data.map(|v| v.to_string()) }
    }
}
