use anyhow::Result;
use axum::serve;
use feed_core::{config::AppConfig, FeedRegistry};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes logging. `RUST_LOG=debug` and `RUST_LOG=trace` widen the workspace crates
/// only; any other `RUST_LOG` value is used as a filter directive.
fn init_logging(config: &AppConfig) {
    let filter = if let Ok(env_filter) = std::env::var("RUST_LOG") {
        if env_filter == "debug" {
            EnvFilter::new("warn,feed_core=debug,server=debug,tests=debug")
        } else if env_filter == "trace" {
            EnvFilter::new("warn,feed_core=trace,server=trace,tests=trace")
        } else {
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("warn,feed_core=debug,server=debug"))
        }
    } else {
        let level = config.logging.level.as_str();
        EnvFilter::new(format!("warn,feed_core={level},server={level}"))
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config = AppConfig::load_validated()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!("Starting block feed server");
    debug!(
        networks = config.networks.len(),
        max_items = config.feed.max_items,
        poll_interval_ms = config.feed.poll_interval_ms,
        "Configuration loaded"
    );

    let registry = Arc::new(
        FeedRegistry::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Feed registry initialization failed: {e}"))?,
    );

    let app = server::create_app(Arc::clone(&registry));
    let addr: SocketAddr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "API server listening");

    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
    }

    registry.shutdown().await;
    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, stopping feeds");
}
