use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::{PushEvent, SourceError};
use crate::item::parse_push_message;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Topic passed to `quai_subscribe`.
pub const WORKSHARE_TOPIC: &str = "newWorkshares";

/// Push subscription to a node's workshare stream.
#[derive(Debug, Clone)]
pub struct WebSocketSubscriber {
    network: Arc<str>,
    ws_url: Option<String>,
}

impl WebSocketSubscriber {
    #[must_use]
    pub fn new(network: Arc<str>, ws_url: Option<String>) -> Self {
        Self { network, ws_url }
    }

    /// Returns `true` if a usable WebSocket URL is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.validate_and_get_ws_url().is_ok()
    }

    /// Connects, subscribes and forwards workshares to `sink` until the stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection or subscription fails, or the
    /// stream reports a transport error.
    pub async fn run(&self, sink: &mpsc::Sender<PushEvent>) -> Result<(), SourceError> {
        let ws_url = self.validate_and_get_ws_url()?;
        let ws_stream = self.connect_websocket(ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        self.send_subscription_message(&mut write).await?;
        if sink.send(PushEvent::Connected).await.is_err() {
            return Ok(());
        }

        self.handle_websocket_messages(&mut read, sink).await
    }

    /// Validates and extracts the WebSocket URL from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no WebSocket URL is configured, the URL is empty,
    /// or the URL does not start with `ws://` or `wss://`.
    fn validate_and_get_ws_url(&self) -> Result<&str, SourceError> {
        let ws_url = self
            .ws_url
            .as_deref()
            .ok_or_else(|| {
                SourceError::InvalidResponse("No WebSocket URL configured".to_string())
            })?;

        if ws_url.trim().is_empty() {
            return Err(SourceError::InvalidResponse("WebSocket URL is empty".to_string()));
        }

        if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
            return Err(SourceError::InvalidResponse(format!(
                "Invalid WebSocket URL format: {ws_url}"
            )));
        }

        Ok(ws_url)
    }

    async fn connect_websocket(&self, ws_url: &str) -> Result<WsStream, SourceError> {
        tracing::info!(network = %self.network, ws_url = ws_url, "connecting to websocket");

        match tokio_tungstenite::connect_async(ws_url).await {
            Ok((ws_stream, response)) => {
                tracing::info!(
                    network = %self.network,
                    status = response.status().as_u16(),
                    "websocket connected"
                );
                Ok(ws_stream)
            }
            Err(e) => {
                tracing::warn!(network = %self.network, error = %e, "websocket connection failed");
                Err(SourceError::ConnectionFailed(format!("WebSocket connection failed: {e}")))
            }
        }
    }

    async fn send_subscription_message(
        &self,
        write: &mut futures_util::stream::SplitSink<WsStream, Message>,
    ) -> Result<(), SourceError> {
        let subscribe_msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "quai_subscribe",
            "params": [WORKSHARE_TOPIC]
        });

        tracing::debug!(
            network = %self.network,
            message = %subscribe_msg,
            "sending subscription message"
        );

        write
            .send(Message::Text(subscribe_msg.to_string().into()))
            .await
            .map_err(|e| SourceError::WebSocket(format!("send error: {e}")))
    }

    async fn handle_websocket_messages(
        &self,
        read: &mut futures_util::stream::SplitStream<WsStream>,
        sink: &mpsc::Sender<PushEvent>,
    ) -> Result<(), SourceError> {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(event) = self.process_text_message(&text) {
                        if sink.send(event).await.is_err() {
                            tracing::debug!(network = %self.network, "push consumer gone");
                            return Ok(());
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::warn!(network = %self.network, "websocket connection closed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(network = %self.network, error = %e, "websocket error");
                    return Err(SourceError::WebSocket(e.to_string()));
                }
                _ => {}
            }
        }

        tracing::warn!(network = %self.network, "websocket stream ended");
        Ok(())
    }

    /// Parses one text frame. Confirmations and unrelated frames yield `None`.
    fn process_text_message(&self, text: &str) -> Option<PushEvent> {
        tracing::trace!(network = %self.network, message = text, "received websocket message");

        match parse_push_message(text) {
            Ok(Some(summary)) => Some(PushEvent::Workshare(summary)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    network = %self.network,
                    error = %e,
                    "dropping malformed push message"
                );
                None
            }
        }
    }
}
