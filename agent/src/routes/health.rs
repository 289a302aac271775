//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connectivity: Connectivity,
    /// Dirty records waiting for the next sync pass
    pub pending: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let pending = state.store.pending_count().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connectivity: state.connectivity.current(),
        pending,
    }))
}

/// Root handler.
async fn root() -> &'static str {
    "Clinic Sync Agent"
}
