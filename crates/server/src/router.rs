//! Read API handlers over the feed registry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use feed_core::{BlockHash, ConnectionStatus, FeedRegistry, FeedSession};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, sync::Arc};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct NetworkSummary {
    pub name: String,
    pub status: ConnectionStatus,
    pub enabled: bool,
    pub max_height: u64,
    pub item_count: usize,
    pub max_items: usize,
}

#[derive(Debug, Serialize)]
pub struct NetworkStatus {
    pub status: ConnectionStatus,
    pub enabled: bool,
    pub max_height: u64,
    pub item_count: usize,
    pub ledger_size: usize,
    pub inflight: usize,
    pub max_items: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RetentionRequest {
    pub max_items: usize,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct BackfillRequestBody {
    pub hash: BlockHash,
}

#[derive(Debug, Serialize)]
pub struct BackfillResponse {
    pub hash: BlockHash,
    pub queued: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler error rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(network: &str) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: format!("unknown network: {network}") }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn lookup<'a>(registry: &'a FeedRegistry, name: &str) -> Result<&'a Arc<FeedSession>, ApiError> {
    registry.get(name).ok_or_else(|| ApiError::not_found(name))
}

fn summarize(session: &FeedSession) -> NetworkSummary {
    let stats = session.stats();
    NetworkSummary {
        name: session.name().to_string(),
        status: session.status(),
        enabled: session.is_enabled(),
        max_height: stats.max_height,
        item_count: stats.item_count,
        max_items: stats.max_items,
    }
}

fn describe(session: &FeedSession) -> NetworkStatus {
    let stats = session.stats();
    NetworkStatus {
        status: session.status(),
        enabled: session.is_enabled(),
        max_height: stats.max_height,
        item_count: stats.item_count,
        ledger_size: stats.ledger_size,
        inflight: stats.inflight,
        max_items: stats.max_items,
        last_error: session.last_error(),
    }
}

/// GET /networks
pub async fn list_networks(State(registry): State<Arc<FeedRegistry>>) -> impl IntoResponse {
    let networks: Vec<_> = registry.sessions().map(|session| summarize(session)).collect();
    Json(networks)
}

/// GET /networks/{name}/items
///
/// Current snapshot, ascending by height.
pub async fn get_items(
    State(registry): State<Arc<FeedRegistry>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = lookup(&registry, &name)?;
    Ok(Json(session.engine().items()))
}

/// GET /networks/{name}/status
pub async fn get_status(
    State(registry): State<Arc<FeedRegistry>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = lookup(&registry, &name)?;
    Ok(Json(describe(session)))
}

/// PUT /networks/{name}/retention
///
/// The new cap applies on the next eviction pass.
pub async fn update_retention(
    State(registry): State<Arc<FeedRegistry>>,
    Path(name): Path<String>,
    Json(request): Json<RetentionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = lookup(&registry, &name)?;
    let max_items = NonZeroUsize::new(request.max_items)
        .ok_or_else(|| ApiError::bad_request("max_items must be greater than 0"))?;

    session.engine().set_max_items(max_items);
    info!(network = %name, max_items = max_items.get(), "retention updated via api");
    Ok(Json(describe(session)))
}

/// POST /networks/{name}/enabled
pub async fn set_enabled(
    State(registry): State<Arc<FeedRegistry>>,
    Path(name): Path<String>,
    Json(request): Json<EnabledRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = lookup(&registry, &name)?;
    session.set_enabled(request.enabled);
    Ok(Json(describe(session)))
}

/// POST /networks/{name}/backfill
///
/// One-hop lookup of a block a renderer found missing. It shares the session's ledger, so
/// a hash already attempted, or any request while disabled, comes back with `queued: false`.
pub async fn request_backfill(
    State(registry): State<Arc<FeedRegistry>>,
    Path(name): Path<String>,
    Json(request): Json<BackfillRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let session = lookup(&registry, &name)?;
    let queued = session.engine().request_backfill(request.hash);
    let status = if queued { StatusCode::ACCEPTED } else { StatusCode::OK };
    Ok((status, Json(BackfillResponse { hash: request.hash, queued })))
}
