use thiserror::Error;

use crate::item::ParseError;

/// Errors that can occur while talking to a node.
///
/// None of these are fatal: callers log them and treat the cycle as "no data".
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SourceError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the node.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-2xx HTTP status. First field is the status code, second the (truncated) body.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    /// Network-level error from the underlying HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response envelope could not be read.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// WebSocket transport failure after the connection was established.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Response was well-formed JSON-RPC but the payload was malformed.
    #[error("Malformed payload: {0}")]
    Parse(#[from] ParseError),
}

impl SourceError {
    /// Returns `true` if the next poll or reconnect may plausibly succeed.
    ///
    /// Transient errors include timeouts, transport failures, HTTP 5xx and 429.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::ConnectionFailed(_) | Self::WebSocket(_) => {
                true
            }
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            // -32005 is the conventional "limit exceeded" code
            Self::RpcError(code, _) => *code == -32005 || *code == -32603,
            _ => false,
        }
    }
}
