use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc;

use super::{EventSource, HttpClient, PushEvent, SourceError, WebSocketSubscriber};
use crate::{
    item::{parse_block, parse_polled_block, PolledBlock, RawBlock},
    types::BlockHash,
};

pub const POLL_METHOD: &str = "quai_getBlockByNumber";
pub const LOOKUP_METHOD: &str = "quai_getBlockByHash";

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i32,
    #[serde(default)]
    message: String,
}

/// JSON-RPC event source for one logical network.
pub struct RpcEventSource {
    network: Arc<str>,
    http_url: String,
    http_client: Arc<HttpClient>,
    websocket: WebSocketSubscriber,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcEventSource {
    #[must_use]
    pub fn new(
        network: Arc<str>,
        http_url: String,
        ws_url: Option<String>,
        http_client: Arc<HttpClient>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            websocket: WebSocketSubscriber::new(Arc::clone(&network), ws_url),
            network,
            http_url,
            http_client,
            request_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends one JSON-RPC call. `Ok(None)` for a null or absent result.
    async fn send_json_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<Value>, SourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let body = serde_json::to_vec(&request).map_err(|e| {
            SourceError::InvalidResponse(format!("request serialization failed: {e}"))
        })?;

        let resp_bytes = self
            .http_client
            .send_request(&self.http_url, Bytes::from(body), self.request_timeout)
            .await?;

        let envelope: RpcEnvelope = serde_json::from_slice(&resp_bytes)
            .map_err(|e| SourceError::InvalidResponse(format!("invalid JSON-RPC envelope: {e}")))?;

        if let Some(error) = envelope.error {
            return Err(SourceError::RpcError(error.code, error.message));
        }

        Ok(envelope.result.filter(|result| !result.is_null()))
    }
}

#[async_trait]
impl EventSource for RpcEventSource {
    async fn poll_latest(&self) -> Result<Option<PolledBlock>, SourceError> {
        let params = json!(["latest", false]);
        let Some(result) = self.send_json_request(POLL_METHOD, params).await? else {
            tracing::debug!(network = %self.network, "poll returned no block");
            return Ok(None);
        };
        Ok(Some(parse_polled_block(&result)?))
    }

    async fn fetch_by_hash(&self, hash: &BlockHash) -> Result<Option<RawBlock>, SourceError> {
        let params = json!([hash.to_string(), false]);
        let Some(result) = self.send_json_request(LOOKUP_METHOD, params).await? else {
            return Ok(None);
        };
        Ok(Some(parse_block(&result)?))
    }

    fn supports_push(&self) -> bool {
        self.websocket.is_configured()
    }

    async fn subscribe(&self, sink: mpsc::Sender<PushEvent>) -> Result<(), SourceError> {
        self.websocket.run(&sink).await
    }
}
