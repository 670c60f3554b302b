//! Event source adapter: the only code that talks to a node.
//!
//! [`EventSource`] is the seam the rest of the crate depends on. [`RpcEventSource`] is the
//! JSON-RPC over HTTP + WebSocket implementation; tests substitute their own.

pub mod errors;
pub mod http_client;
pub mod rpc;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use errors::SourceError;
pub use http_client::{HttpClient, HttpClientConfig};
pub use rpc::RpcEventSource;
pub use websocket::WebSocketSubscriber;

use crate::{
    item::{PolledBlock, RawBlock, RawSummary},
    types::BlockHash,
};

/// Messages a push subscription delivers to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The subscription request was sent on a fresh connection.
    Connected,
    Workshare(RawSummary),
}

/// Delivers raw notifications from one logical network.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Requests the latest block. `Ok(None)` means the node had nothing to report.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failures, RPC errors and malformed payloads.
    async fn poll_latest(&self) -> Result<Option<PolledBlock>, SourceError>;

    /// Point lookup of a block header by hash, used for backfill.
    ///
    /// # Errors
    ///
    /// Same as [`EventSource::poll_latest`].
    async fn fetch_by_hash(&self, hash: &BlockHash) -> Result<Option<RawBlock>, SourceError>;

    /// Whether [`EventSource::subscribe`] can be used.
    fn supports_push(&self) -> bool {
        false
    }

    /// Runs one push subscription until the connection ends.
    ///
    /// Returns `Ok(())` when the server closes the stream or `sink` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the connection or subscription cannot be established or
    /// the stream fails.
    async fn subscribe(&self, sink: mpsc::Sender<PushEvent>) -> Result<(), SourceError> {
        drop(sink);
        Err(SourceError::WebSocket("push subscription not supported".to_string()))
    }
}
