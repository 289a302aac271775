//! Sync, connectivity and session routes.

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};

use crate::error::Result;
use crate::handlers::{
    handle_clear_session, handle_connectivity, handle_outbox, handle_set_session,
    handle_trigger, ConnectivityRequest, ConnectivityResponse, OutboxResponse, SessionRequest,
    SessionResponse,
};
use crate::orchestrator::TriggerResult;
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync_handler))
        .route("/outbox", get(outbox_handler))
        .route("/connectivity", put(connectivity_handler))
        .route("/session", put(set_session_handler).delete(clear_session_handler))
}

/// POST /sync - Run a sync pass now.
async fn sync_handler(State(state): State<AppState>) -> Result<Json<TriggerResult>> {
    Ok(Json(handle_trigger(&state.orchestrator).await?))
}

/// GET /outbox - Queued work per collection.
async fn outbox_handler(State(state): State<AppState>) -> Result<Json<OutboxResponse>> {
    let response =
        handle_outbox(&state.store, &state.orchestrator, &state.connectivity).await?;
    Ok(Json(response))
}

/// PUT /connectivity - Host reports online/offline.
async fn connectivity_handler(
    State(state): State<AppState>,
    Json(request): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    Json(handle_connectivity(&state.connectivity, request))
}

async fn set_session_handler(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>> {
    Ok(Json(handle_set_session(&state.session, request).await?))
}

async fn clear_session_handler(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(handle_clear_session(&state.session).await)
}
