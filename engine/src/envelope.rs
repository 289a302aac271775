//! Record envelopes: a domain payload plus its sync-state metadata.

use crate::{Collection, Error, RecordId, Result, Revision, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Reconciliation state of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    /// Matches the server's copy
    Clean,
    /// Created locally, never seen by the server
    PendingCreate,
    /// Edited locally after an authoritative fetch
    PendingUpdate,
    /// Deleted locally; kept as a tombstone until acknowledged
    PendingDelete,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Clean => "clean",
            SyncState::PendingCreate => "pendingCreate",
            SyncState::PendingUpdate => "pendingUpdate",
            SyncState::PendingDelete => "pendingDelete",
        }
    }

    /// Whether the record still has to be relayed to the server.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, SyncState::Clean)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "clean" => Ok(SyncState::Clean),
            "pendingCreate" => Ok(SyncState::PendingCreate),
            "pendingUpdate" => Ok(SyncState::PendingUpdate),
            "pendingDelete" => Ok(SyncState::PendingDelete),
            other => Err(Error::InvalidSyncState(other.to_string())),
        }
    }
}

/// Body serialization used when relaying a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    #[default]
    Json,
    Multipart,
}

impl PayloadEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadEncoding::Json => "json",
            PayloadEncoding::Multipart => "multipart",
        }
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(PayloadEncoding::Json),
            "multipart" => Ok(PayloadEncoding::Multipart),
            other => Err(Error::InvalidEncoding(other.to_string())),
        }
    }
}

/// Domain payload of a record, tagged with the collection it belongs to.
///
/// Field shapes are owned by the remote API, so the fields stay a JSON
/// object; the collection tag decides which fields are engine-owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    collection: Collection,
    fields: Map<String, Value>,
}

impl Payload {
    /// Wrap a JSON value as the payload of `collection`.
    ///
    /// The value must be an object.
    pub fn new(collection: Collection, value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { collection, fields }),
            other => Err(Error::InvalidPayload(format!(
                "{} payload must be an object, got {}",
                collection,
                json_type_name(&other)
            ))),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Merge `other` into this payload; values from `other` win per key.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.fields.insert(key, value);
        }
    }

    /// Identifier carried in the key field, if any.
    ///
    /// Numeric identifiers are rendered as text.
    pub fn key(&self) -> Option<RecordId> {
        match self.fields.get(self.collection.key_field())? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Fields sent to the server: engine-owned fields stripped, `null` and
    /// literal `"null"` values dropped at every depth.
    pub fn outbound_fields(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| !self.collection.is_reserved_field(key))
            .filter_map(|(key, value)| prune_nulls(value).map(|v| (key.clone(), v)))
            .collect()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == "null",
        _ => false,
    }
}

fn prune_nulls(value: &Value) -> Option<Value> {
    if is_null_like(value) {
        return None;
    }
    match value {
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(k, v)| prune_nulls(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
        Value::Array(items) => Some(Value::Array(items.iter().filter_map(prune_nulls).collect())),
        other => Some(other.clone()),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The unit stored per collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Server id for clean records, a local UUID for offline creates
    pub id: RecordId,
    #[serde(flatten)]
    pub payload: Payload,
    pub sync_state: SyncState,
    /// Relative server path for the pending mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub payload_encoding: PayloadEncoding,
    /// Bumped on every local mutation
    #[serde(default)]
    pub revision: Revision,
    /// Last local write (milliseconds since epoch)
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Envelope {
    /// Wrap a record returned by an authoritative fetch.
    ///
    /// The id is read from the collection's key field.
    pub fn clean(collection: Collection, value: Value, timestamp: Timestamp) -> Result<Self> {
        let payload = Payload::new(collection, value)?;
        let id = payload.key().ok_or_else(|| {
            Error::InvalidPayload(format!(
                "{} record has no '{}' field",
                collection,
                collection.key_field()
            ))
        })?;

        Ok(Self {
            id,
            payload,
            sync_state: SyncState::Clean,
            endpoint: None,
            payload_encoding: PayloadEncoding::Json,
            revision: 0,
            updated_at: timestamp,
        })
    }

    pub fn collection(&self) -> Collection {
        self.payload.collection()
    }

    pub fn is_dirty(&self) -> bool {
        self.sync_state.is_dirty()
    }

    /// Tombstones are hidden from normal reads but kept until synced.
    pub fn is_tombstone(&self) -> bool {
        self.sync_state == SyncState::PendingDelete
    }

    pub(crate) fn touch(&mut self, timestamp: Timestamp) {
        self.revision += 1;
        self.updated_at = timestamp;
    }
}
