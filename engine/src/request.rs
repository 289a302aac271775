//! Planning the single outbound request that relays a dirty envelope.

use crate::{
    encoder_for, Collection, Envelope, Error, RecordId, RequestBody, Result, Revision, SyncState,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method of a relay request.
///
/// Deletes are soft deletes on the server, so there is no `DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to send one relay request, minus auth and base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPlan {
    pub collection: Collection,
    pub id: RecordId,
    /// Revision of the envelope the plan was built from
    pub revision: Revision,
    pub sync_state: SyncState,
    pub method: HttpMethod,
    /// Path relative to the API base, without leading slash
    pub path: String,
    pub body: RequestBody,
}

/// Build the relay request for a dirty envelope.
///
/// - `pendingCreate` → `POST {endpoint}`
/// - `pendingUpdate` → `PUT {endpoint}/{id}`
/// - `pendingDelete` → `PUT {endpoint}/{id}`
pub fn plan_request(envelope: &Envelope) -> Result<RequestPlan> {
    let collection = envelope.collection();

    let endpoint = envelope
        .endpoint
        .as_deref()
        .map(|e| e.trim_matches('/'))
        .filter(|e| !e.is_empty())
        .ok_or_else(|| Error::MissingEndpoint {
            collection,
            id: envelope.id.clone(),
        })?;

    let (method, path) = match envelope.sync_state {
        SyncState::Clean => {
            return Err(Error::NothingToSync {
                collection,
                id: envelope.id.clone(),
            })
        }
        SyncState::PendingCreate => (HttpMethod::Post, endpoint.to_string()),
        SyncState::PendingUpdate | SyncState::PendingDelete => {
            (HttpMethod::Put, format!("{}/{}", endpoint, envelope.id))
        }
    };

    let body = encoder_for(envelope.payload_encoding).encode(&envelope.payload.outbound_fields());

    Ok(RequestPlan {
        collection,
        id: envelope.id.clone(),
        revision: envelope.revision,
        sync_state: envelope.sync_state,
        method,
        path,
        body,
    })
}
