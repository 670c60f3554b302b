//! HTTP read API over the per-network block feeds.

pub mod middleware;
pub mod router;

use axum::{
    http::Method,
    routing::{get, post, put},
    Router,
};
use feed_core::FeedRegistry;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

/// Builds the API router. Renderers poll it from browsers, so CORS is open for reads and
/// the control endpoints.
pub fn create_app(registry: Arc<FeedRegistry>) -> Router {
    let (set_request_id, propagate_request_id) = middleware::request_id_layers();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/networks", get(router::list_networks))
        .route("/networks/{name}/items", get(router::get_items))
        .route("/networks/{name}/status", get(router::get_status))
        .route("/networks/{name}/retention", put(router::update_retention))
        .route("/networks/{name}/enabled", post(router::set_enabled))
        .route("/networks/{name}/backfill", post(router::request_backfill))
        .with_state(registry)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(propagate_request_id)
        .layer(set_request_id)
}
