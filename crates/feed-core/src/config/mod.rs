//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `set_default` calls in [`AppConfig::from_file`]
//! 2. **Config file**: TOML file named by the `FEED_CONFIG` env var
//! 3. **Environment variables**: `FEED__SECTION__KEY` overrides
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_port = 3040
//!
//! [feed]
//! poll_interval_ms = 2000
//! max_items = 500
//!
//! [[networks]]
//! name = "cyprus1"
//! http_url = "http://localhost:9200"
//! ws_url = "ws://localhost:8200"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};
use thiserror::Error;

use crate::{
    engine::EngineConfig,
    resolver::BackfillWorkerConfig,
    session::SessionConfig,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the read API to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Defaults to `3040`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    3040
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

/// Reconciliation and connection tunables shared by every network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bound on every poll, lookup and backfill request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Fixed delay before reconnecting a closed push subscription.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// Retention cap per network. Adjustable at runtime through the read API.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Backfill hops per triggering event.
    #[serde(default = "default_max_backfill_depth")]
    pub max_backfill_depth: u32,

    #[serde(default = "default_backfill_queue_capacity")]
    pub backfill_queue_capacity: usize,

    #[serde(default = "default_max_concurrent_backfills")]
    pub max_concurrent_backfills: usize,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_eviction_interval_secs() -> u64 {
    30
}

fn default_max_items() -> usize {
    500
}

fn default_max_backfill_depth() -> u32 {
    1
}

fn default_backfill_queue_capacity() -> usize {
    256
}

fn default_max_concurrent_backfills() -> usize {
    8
}

/// One logical network: a JSON-RPC endpoint and an optional push endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub http_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Start ingesting at boot.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), bind_port: default_bind_port() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            eviction_interval_secs: default_eviction_interval_secs(),
            max_items: default_max_items(),
            max_backfill_depth: default_max_backfill_depth(),
            backfill_queue_capacity: default_backfill_queue_capacity(),
            max_concurrent_backfills: default_max_concurrent_backfills(),
        }
    }
}

impl FeedConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_items: self.max_items,
            max_backfill_depth: self.max_backfill_depth,
            backfill_queue_capacity: self.backfill_queue_capacity,
        }
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: self.request_timeout(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            eviction_interval: Duration::from_secs(self.eviction_interval_secs),
            backfill: BackfillWorkerConfig {
                request_timeout: self.request_timeout(),
                max_concurrent: self.max_concurrent_backfills,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Use `__` as a separator for nested fields (e.g., `FEED__FEED__MAX_ITEMS=1000`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", "127.0.0.1")?
            .set_default("server.bind_port", 3040)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("feed.poll_interval_ms", 2_000)?
            .set_default("feed.request_timeout_ms", 10_000)?
            .set_default("feed.reconnect_delay_ms", 3_000)?
            .set_default("feed.eviction_interval_secs", 30)?
            .set_default("feed.max_items", 500)?
            .set_default("feed.max_backfill_depth", 1)?
            .set_default("feed.backfill_queue_capacity", 256)?
            .set_default("feed.max_concurrent_backfills", 8)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("FEED").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads from `FEED_CONFIG` (default `config/config.toml`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FEED_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// [`AppConfig::load`] followed by [`AppConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedConfigError`] if loading or validation fails.
    pub fn load_validated() -> Result<Self, FeedConfigError> {
        let config = Self::load()?;
        config.validate().map_err(FeedConfigError::Invalid)?;
        Ok(config)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.networks.is_empty() {
            return Err("No networks configured".to_string());
        }

        let mut names = HashSet::new();
        for network in &self.networks {
            if network.name.trim().is_empty() {
                return Err("Network name must not be empty".to_string());
            }
            if !names.insert(network.name.as_str()) {
                return Err(format!("Duplicate network name: {}", network.name));
            }
            if !network.http_url.starts_with("http://")
                && !network.http_url.starts_with("https://")
            {
                return Err(format!(
                    "Invalid HTTP URL for network {}: {}",
                    network.name, network.http_url
                ));
            }
            if let Some(ref ws_url) = network.ws_url {
                if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
                    return Err(format!(
                        "Invalid WebSocket URL for network {}: {}",
                        network.name, ws_url
                    ));
                }
            }
        }

        let feed = &self.feed;
        if feed.poll_interval_ms == 0 {
            return Err("Poll interval must be greater than 0".to_string());
        }
        if feed.request_timeout_ms == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }
        if feed.reconnect_delay_ms == 0 {
            return Err("Reconnect delay must be greater than 0".to_string());
        }
        if feed.eviction_interval_secs == 0 {
            return Err("Eviction interval must be greater than 0".to_string());
        }
        if feed.max_items == 0 {
            return Err("Max items must be greater than 0".to_string());
        }
        if feed.max_backfill_depth == 0 {
            return Err("Max backfill depth must be at least 1".to_string());
        }
        if feed.backfill_queue_capacity == 0 || feed.max_concurrent_backfills == 0 {
            return Err(
                "Backfill queue capacity and concurrency must be greater than 0".to_string()
            );
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
