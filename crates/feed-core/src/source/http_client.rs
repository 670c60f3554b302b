use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;

use super::SourceError;

/// Maximum response body kept in an [`SourceError::HttpError`].
const MAX_ERROR_BODY: usize = 256;

/// Configuration for the JSON-RPC HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent requests to one node.
    pub concurrent_limit: usize,
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { concurrent_limit: 16, connect_timeout: Duration::from_secs(5) }
    }
}

/// HTTP client with semaphore-based concurrency control.
///
/// Requests are never retried here: a failed poll is retried by the next tick and a
/// failed backfill is not retried at all.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
}

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_config(&HttpClientConfig::default())
    }

    /// Sanitizes network errors to prevent information disclosure.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: &HttpClientConfig) -> Result<Self, SourceError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(config.connect_timeout)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("block-feed/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                SourceError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        let concurrent_limit = Arc::new(Semaphore::new(config.concurrent_limit.max(1)));
        Ok(Self { client, concurrent_limit })
    }

    /// Sends a JSON POST body and returns the raw response body.
    ///
    /// `timeout` bounds the whole exchange including waiting for a permit.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Timeout`] if the permit or the request times out
    /// - [`SourceError::HttpError`] for non-success HTTP status codes
    /// - [`SourceError::ConnectionFailed`] for transport failures
    pub async fn send_request(
        &self,
        url: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, SourceError> {
        tokio::time::timeout(timeout, self.send_with_permit(url, body, timeout))
            .await
            .map_err(|_| {
                tracing::debug!(url = url, "http request timed out");
                SourceError::Timeout
            })?
    }

    async fn send_with_permit(
        &self,
        url: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, SourceError> {
        let _permit = Arc::clone(&self.concurrent_limit)
            .acquire_owned()
            .await
            .map_err(|_| SourceError::ConnectionFailed("http client closed".to_string()))?;

        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout
                } else {
                    SourceError::ConnectionFailed(Self::sanitize_network_error(&e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.bytes().await.map_err(SourceError::Network);
        }

        let raw_text = response.text().await.unwrap_or_default();
        let sanitized_text = if raw_text.len() > MAX_ERROR_BODY {
            let cut =
                (0..=MAX_ERROR_BODY).rev().find(|i| raw_text.is_char_boundary(*i)).unwrap_or(0);
            format!("{}... (truncated)", &raw_text[..cut])
        } else {
            raw_text
        };
        tracing::trace!(status = status.as_u16(), "http request failed");
        Err(SourceError::HttpError(status.as_u16(), sanitized_text))
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
