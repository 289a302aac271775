//! Collection endpoint routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use clinic_sync_engine::Envelope;
use serde_json::Value;

use crate::error::Result;
use crate::handlers::{
    handle_add, handle_clear, handle_delete, handle_get, handle_get_all, handle_save_all,
    handle_update, parse_collection, ClearResponse, DeleteQuery, MutationRequest, QueuedResponse,
};
use crate::store::SaveAllReport;
use crate::AppState;

/// Create collection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/collections/{collection}",
            get(get_all_handler)
                .put(save_all_handler)
                .post(add_handler)
                .delete(clear_handler),
        )
        .route(
            "/collections/{collection}/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
}

/// GET /collections/{collection} - Cached records, tombstones hidden.
async fn get_all_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Envelope>>> {
    let collection = parse_collection(&collection)?;
    Ok(Json(handle_get_all(&state.store, collection).await?))
}

/// PUT /collections/{collection} - Authoritative refresh from the server.
async fn save_all_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(records): Json<Vec<Value>>,
) -> Result<Json<SaveAllReport>> {
    let collection = parse_collection(&collection)?;
    Ok(Json(handle_save_all(&state.store, collection, records).await?))
}

/// POST /collections/{collection} - Create offline.
async fn add_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(request): Json<MutationRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    let collection = parse_collection(&collection)?;
    let response = handle_add(&state.store, collection, request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// DELETE /collections/{collection} - Drop everything, pending work included.
async fn clear_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<ClearResponse>> {
    let collection = parse_collection(&collection)?;
    Ok(Json(handle_clear(&state.store, collection).await?))
}

async fn get_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Envelope>> {
    let collection = parse_collection(&collection)?;
    Ok(Json(handle_get(&state.store, collection, &id).await?))
}

/// PATCH /collections/{collection}/{id} - Merge fields offline.
async fn update_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(request): Json<MutationRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    let collection = parse_collection(&collection)?;
    let response = handle_update(&state.store, collection, &id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// DELETE /collections/{collection}/{id}?endpoint=... - Delete offline.
async fn delete_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    let collection = parse_collection(&collection)?;
    let response = handle_delete(&state.store, collection, &id, query).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
