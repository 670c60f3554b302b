//! Named set of feed sessions, one per configured network.

use std::{collections::HashMap, sync::Arc};
use tracing::info;

use super::FeedSession;
use crate::{
    config::AppConfig,
    source::{EventSource, HttpClient, HttpClientConfig, RpcEventSource, SourceError},
};

pub struct FeedRegistry {
    sessions: HashMap<String, Arc<FeedSession>>,
    order: Vec<String>,
}

impl FeedRegistry {
    /// Wraps already-built sessions, keyed by their names.
    #[must_use]
    pub fn new(sessions: impl IntoIterator<Item = Arc<FeedSession>>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for session in sessions {
            let name = session.name().to_string();
            if map.insert(name.clone(), session).is_none() {
                order.push(name);
            }
        }
        Self { sessions: map, order }
    }

    /// Builds one RPC-backed session per configured network, sharing a single HTTP client,
    /// and enables the ones marked `enabled`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let feed = &config.feed;
        let http_client = Arc::new(HttpClient::with_config(&HttpClientConfig::default())?);
        let engine_config = feed.engine_config();

        let sessions: Vec<_> = config
            .networks
            .iter()
            .map(|network| {
                let name: Arc<str> = Arc::from(network.name.as_str());
                let source: Arc<dyn EventSource> = Arc::new(RpcEventSource::new(
                    Arc::clone(&name),
                    network.http_url.clone(),
                    network.ws_url.clone(),
                    Arc::clone(&http_client),
                    feed.request_timeout(),
                ));
                let session =
                    FeedSession::spawn(name, source, &engine_config, feed.session_config());
                if network.enabled {
                    session.set_enabled(true);
                }
                session
            })
            .collect();

        info!(networks = sessions.len(), "feed registry initialized");
        Ok(Self::new(sessions))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<FeedSession>> {
        self.sessions.get(name)
    }

    /// Sessions in registration order.
    pub fn sessions(&self) -> impl Iterator<Item = &Arc<FeedSession>> {
        self.order.iter().filter_map(|name| self.sessions.get(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub async fn shutdown(&self) {
        for session in self.sessions() {
            session.shutdown().await;
        }
        info!("feed registry shutdown complete");
    }
}
