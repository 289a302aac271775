//! Local mutations and the sync-state transitions they cause.
//!
//! Writes made while offline are expressed as mutations applied to
//! envelopes. The transitions here are the only place sync states change:
//!
//! | current         | update          | delete                 |
//! |-----------------|-----------------|------------------------|
//! | `clean`         | `pendingUpdate` | `pendingDelete`        |
//! | `pendingCreate` | `pendingCreate` | removed outright       |
//! | `pendingUpdate` | `pendingUpdate` | `pendingDelete`        |
//! | `pendingDelete` | not found       | not found              |

use crate::{
    Collection, Envelope, Error, Payload, PayloadEncoding, RecordId, Result, SyncState, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Create a record that the server has never seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMutation {
    pub collection: Collection,
    /// Endpoint the create is posted to
    pub endpoint: String,
    pub payload: Value,
    #[serde(default)]
    pub encoding: PayloadEncoding,
}

/// Edit an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMutation {
    pub collection: Collection,
    pub id: RecordId,
    /// Endpoint base; the request goes to `{endpoint}/{id}`
    pub endpoint: String,
    /// Fields to merge into the stored payload
    pub payload: Value,
    #[serde(default)]
    pub encoding: PayloadEncoding,
}

/// Delete an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMutation {
    pub collection: Collection,
    pub id: RecordId,
    /// Endpoint base; the soft delete goes to `{endpoint}/{id}`
    pub endpoint: String,
}

/// A local write waiting to be applied to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mutation {
    Create(CreateMutation),
    Update(UpdateMutation),
    Delete(DeleteMutation),
}

impl Mutation {
    /// Get the collection this mutation targets.
    pub fn collection(&self) -> Collection {
        match self {
            Mutation::Create(m) => m.collection,
            Mutation::Update(m) => m.collection,
            Mutation::Delete(m) => m.collection,
        }
    }

    /// Get the record ID this mutation targets. Creates have none yet.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update(m) => Some(&m.id),
            Mutation::Delete(m) => Some(&m.id),
        }
    }
}

/// What a delete did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteOutcome {
    /// The record was never synced; it must be removed outright
    Discarded,
    /// The record is now a `pendingDelete` tombstone
    Tombstoned,
}

impl CreateMutation {
    pub fn new(
        collection: Collection,
        endpoint: impl Into<String>,
        payload: Value,
        encoding: PayloadEncoding,
    ) -> Self {
        Self {
            collection,
            endpoint: endpoint.into(),
            payload,
            encoding,
        }
    }

    /// Build the `pendingCreate` envelope under a freshly generated local id.
    pub fn into_envelope(self, id: impl Into<RecordId>, timestamp: Timestamp) -> Result<Envelope> {
        let payload = Payload::new(self.collection, self.payload)?;
        Ok(Envelope {
            id: id.into(),
            payload,
            sync_state: SyncState::PendingCreate,
            endpoint: Some(self.endpoint),
            payload_encoding: self.encoding,
            revision: 1,
            updated_at: timestamp,
        })
    }
}

impl UpdateMutation {
    pub fn new(
        collection: Collection,
        endpoint: impl Into<String>,
        id: impl Into<RecordId>,
        payload: Value,
        encoding: PayloadEncoding,
    ) -> Self {
        Self {
            collection,
            id: id.into(),
            endpoint: endpoint.into(),
            payload,
            encoding,
        }
    }

    /// Merge the update into `envelope`.
    ///
    /// A `pendingCreate` record keeps its state, endpoint and encoding so the
    /// amended payload is still posted as a create.
    pub fn apply(self, envelope: &mut Envelope, timestamp: Timestamp) -> Result<()> {
        if envelope.is_tombstone() {
            return Err(Error::RecordNotFound {
                collection: self.collection,
                id: self.id,
            });
        }

        let fields = Payload::new(self.collection, self.payload)?;
        envelope.payload.merge(fields.fields().clone());

        if envelope.sync_state != SyncState::PendingCreate {
            envelope.sync_state = SyncState::PendingUpdate;
            envelope.endpoint = Some(self.endpoint);
            envelope.payload_encoding = self.encoding;
        }

        envelope.touch(timestamp);
        Ok(())
    }
}

impl DeleteMutation {
    pub fn new(
        collection: Collection,
        endpoint: impl Into<String>,
        id: impl Into<RecordId>,
    ) -> Self {
        Self {
            collection,
            id: id.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Tombstone `envelope`, or report that it must be discarded.
    ///
    /// A discarded envelope is left untouched; removing it is up to the store.
    pub fn apply(self, envelope: &mut Envelope, timestamp: Timestamp) -> Result<DeleteOutcome> {
        match envelope.sync_state {
            SyncState::PendingDelete => Err(Error::RecordNotFound {
                collection: self.collection,
                id: self.id,
            }),
            SyncState::PendingCreate => Ok(DeleteOutcome::Discarded),
            SyncState::Clean | SyncState::PendingUpdate => {
                envelope.sync_state = SyncState::PendingDelete;
                envelope.endpoint = Some(self.endpoint);
                envelope.touch(timestamp);
                Ok(DeleteOutcome::Tombstoned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn created() -> Envelope {
        CreateMutation::new(
            Collection::Patients,
            "patient/patient-create",
            json!({"name": "Ann", "age": 30}),
            PayloadEncoding::Json,
        )
        .into_envelope("local-1", 1000)
        .unwrap()
    }

    fn clean() -> Envelope {
        Envelope::clean(
            Collection::Patients,
            json!({"_id": "p-1", "name": "Bob"}),
            1000,
        )
        .unwrap()
    }

    #[test]
    fn create_is_pending() {
        let env = created();
        assert_eq!(env.id, "local-1");
        assert_eq!(env.sync_state, SyncState::PendingCreate);
        assert_eq!(env.endpoint.as_deref(), Some("patient/patient-create"));
        assert_eq!(env.revision, 1);
    }

    #[test]
    fn create_rejects_non_object() {
        let result = CreateMutation::new(
            Collection::Patients,
            "patient/patient-create",
            json!("Ann"),
            PayloadEncoding::Json,
        )
        .into_envelope("local-1", 1000);
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn update_on_pending_create_stays_create() {
        let mut env = created();
        UpdateMutation::new(
            Collection::Patients,
            "patient/patient-update",
            "local-1",
            json!({"age": 31}),
            PayloadEncoding::Multipart,
        )
        .apply(&mut env, 2000)
        .unwrap();

        assert_eq!(env.sync_state, SyncState::PendingCreate);
        assert_eq!(env.endpoint.as_deref(), Some("patient/patient-create"));
        assert_eq!(env.payload_encoding, PayloadEncoding::Json);
        assert_eq!(env.payload.get("age"), Some(&json!(31)));
        assert_eq!(env.payload.get("name"), Some(&json!("Ann")));
        assert_eq!(env.revision, 2);
        assert_eq!(env.updated_at, 2000);
    }

    #[test]
    fn update_on_clean_becomes_pending_update() {
        let mut env = clean();
        UpdateMutation::new(
            Collection::Patients,
            "patient/patient-update",
            "p-1",
            json!({"name": "Robert"}),
            PayloadEncoding::Multipart,
        )
        .apply(&mut env, 2000)
        .unwrap();

        assert_eq!(env.sync_state, SyncState::PendingUpdate);
        assert_eq!(env.endpoint.as_deref(), Some("patient/patient-update"));
        assert_eq!(env.payload_encoding, PayloadEncoding::Multipart);
        assert_eq!(env.payload.get("name"), Some(&json!("Robert")));
        assert_eq!(env.revision, 1);
    }

    #[test]
    fn delete_pending_create_is_discarded() {
        let mut env = created();
        let before = env.clone();
        let outcome = DeleteMutation::new(Collection::Patients, "patient/delete", "local-1")
            .apply(&mut env, 2000)
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Discarded);
        assert_eq!(env, before);
    }

    #[test]
    fn delete_clean_is_tombstoned() {
        let mut env = clean();
        let outcome = DeleteMutation::new(Collection::Patients, "patient/delete", "p-1")
            .apply(&mut env, 2000)
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Tombstoned);
        assert!(env.is_tombstone());
        assert_eq!(env.endpoint.as_deref(), Some("patient/delete"));
    }

    #[test]
    fn tombstone_rejects_further_writes() {
        let mut env = clean();
        DeleteMutation::new(Collection::Patients, "patient/delete", "p-1")
            .apply(&mut env, 2000)
            .unwrap();

        let update = UpdateMutation::new(
            Collection::Patients,
            "patient/update",
            "p-1",
            json!({"name": "x"}),
            PayloadEncoding::Json,
        )
        .apply(&mut env, 3000);
        assert!(matches!(update, Err(Error::RecordNotFound { .. })));

        let delete = DeleteMutation::new(Collection::Patients, "patient/delete", "p-1")
            .apply(&mut env, 3000);
        assert!(matches!(delete, Err(Error::RecordNotFound { .. })));
    }

    #[test]
    fn mutation_serialization() {
        let m = Mutation::Delete(DeleteMutation::new(
            Collection::Suppliers,
            "supplier/delete",
            "s-1",
        ));
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"type\":\"delete\""));
        assert_eq!(m.collection(), Collection::Suppliers);
        assert_eq!(m.record_id().map(String::as_str), Some("s-1"));

        let parsed: Mutation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, m);
    }
}
