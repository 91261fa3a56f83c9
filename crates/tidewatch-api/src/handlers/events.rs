//! Sync and seed handlers.
//!
//! Both operations delegate to the engine and return the gathered event
//! list as JSON. Failures map to structured error bodies: upstream feed
//! trouble reads as a bad gateway, storage trouble as an internal error.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tidewatch_core::models::{CollectionKey, SyncRequest};
use tidewatch_sync::SyncError;
use tracing::{error, info, instrument};

use crate::AppState;

/// Request body for seeding baseline events.
#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    /// Collection to seed.
    pub collection: CollectionKey,
}

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable error description.
    pub message: String,
}

/// Synchronizes events for a collection and kind.
///
/// Runs one incremental sync: resolves the stored watermark, gathers new
/// events from the feed, persists them, notifies the requested targets,
/// and returns the gathered batch.
#[instrument(
    name = "sync_events",
    skip(state, request),
    fields(collection = %request.collection, kind = %request.kind)
)]
pub async fn sync_events(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Response {
    match state.engine.sync(request).await {
        Ok(events) => {
            info!(gathered = events.len(), "sync completed");
            (StatusCode::OK, Json(events)).into_response()
        },
        Err(sync_error) => {
            error!(error = %sync_error, "sync failed");
            error_response(&sync_error)
        },
    }
}

/// Seeds one most-recent listing and sale for a collection.
///
/// Establishes an initial watermark so a later sync does not re-import
/// full history. Returns the seeded listing batch.
#[instrument(name = "seed_baseline", skip(state, request), fields(collection = %request.collection))]
pub async fn seed_baseline(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> Response {
    match state.engine.seed_baseline(request.collection).await {
        Ok(events) => {
            info!(seeded = events.len(), "baseline seeded");
            (StatusCode::OK, Json(events)).into_response()
        },
        Err(sync_error) => {
            error!(error = %sync_error, "baseline seeding failed");
            error_response(&sync_error)
        },
    }
}

fn error_response(sync_error: &SyncError) -> Response {
    let (status, code) = match sync_error {
        SyncError::UpstreamFetch { .. } => (StatusCode::BAD_GATEWAY, "upstream_fetch"),
        SyncError::Persistence { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "persistence"),
    };

    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail { code: code.to_string(), message: sync_error.to_string() },
        }),
    )
        .into_response()
}
