//! Collection handlers - local reads and writes on behalf of the host UI.

use clinic_sync_engine::{Collection, DeleteMutation, Envelope, Mutation, PayloadEncoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::store::{Applied, LocalStore, SaveAllReport};

/// Notice shown to the user after an offline write.
pub const QUEUED_NOTICE: &str = "Saved locally. Changes will sync when you're back online.";

/// Body of a create or update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    /// Relative API path the mutation is relayed to
    pub endpoint: String,
    pub payload: Value,
    #[serde(default)]
    pub encoding: PayloadEncoding,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub endpoint: String,
}

/// Response to an accepted local write.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Envelope>,
    /// Set when an unsynced create was deleted outright
    pub discarded: bool,
    pub notice: &'static str,
}

impl QueuedResponse {
    fn stored(envelope: Envelope) -> Self {
        Self {
            record: Some(envelope),
            discarded: false,
            notice: QUEUED_NOTICE,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub removed: u64,
}

pub fn parse_collection(raw: &str) -> Result<Collection> {
    Ok(raw.parse::<Collection>()?)
}

fn require_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.trim().trim_matches('/').is_empty() {
        return Err(AppError::BadRequest("endpoint must not be empty".to_string()));
    }
    Ok(())
}

pub async fn handle_get_all(store: &LocalStore, collection: Collection) -> Result<Vec<Envelope>> {
    store.get_all(collection).await
}

pub async fn handle_get(store: &LocalStore, collection: Collection, id: &str) -> Result<Envelope> {
    store
        .get(collection, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} record {}", collection, id)))
}

/// Replace a collection with records fetched from the server.
pub async fn handle_save_all(
    store: &LocalStore,
    collection: Collection,
    records: Vec<Value>,
) -> Result<SaveAllReport> {
    store.save_all(collection, records).await
}

pub async fn handle_add(
    store: &LocalStore,
    collection: Collection,
    request: MutationRequest,
) -> Result<QueuedResponse> {
    require_endpoint(&request.endpoint)?;
    let envelope = store
        .add(collection, &request.endpoint, request.payload, request.encoding)
        .await?;
    Ok(QueuedResponse::stored(envelope))
}

pub async fn handle_update(
    store: &LocalStore,
    collection: Collection,
    id: &str,
    request: MutationRequest,
) -> Result<QueuedResponse> {
    require_endpoint(&request.endpoint)?;
    let envelope = store
        .update(
            collection,
            &request.endpoint,
            id,
            request.payload,
            request.encoding,
        )
        .await?;
    Ok(QueuedResponse::stored(envelope))
}

pub async fn handle_delete(
    store: &LocalStore,
    collection: Collection,
    id: &str,
    query: DeleteQuery,
) -> Result<QueuedResponse> {
    require_endpoint(&query.endpoint)?;
    let delete = DeleteMutation::new(collection, query.endpoint, id);
    let response = match store.apply(Mutation::Delete(delete)).await? {
        Applied::Stored(tombstone) => QueuedResponse::stored(tombstone),
        Applied::Discarded { .. } => QueuedResponse {
            record: None,
            discarded: true,
            notice: QUEUED_NOTICE,
        },
    };
    Ok(response)
}

pub async fn handle_clear(store: &LocalStore, collection: Collection) -> Result<ClearResponse> {
    let removed = store.clear(collection).await?;
    Ok(ClearResponse { removed })
}
