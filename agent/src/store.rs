//! The local store: durable CRUD over the fixed set of collections.
//!
//! `LocalStore` is an explicitly opened service. Clones share one connection
//! pool and one event channel, so the same handle can be injected into the
//! orchestrator and the control surface.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use clinic_sync_engine::{
    collect_dirty, Collection, CreateMutation, DeleteMutation, DeleteOutcome, Envelope, Mutation,
    OutboxEntry, OutboxSummary, PayloadEncoding, RecordId, Revision, SyncState, Timestamp,
    UpdateMutation,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::db::{self, Pool, StoredEnvelope};
use crate::error::Result;

/// Capacity of the store event channel; slow subscribers lag, writers never block.
const EVENT_CAPACITY: usize = 256;

/// Where and how to open the local store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
        }
    }
}

/// Notifications emitted by the store and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    /// A local write was saved and will be relayed on the next sync pass
    #[serde(rename_all = "camelCase")]
    Queued {
        collection: Collection,
        id: RecordId,
        sync_state: SyncState,
    },
    /// A collection was refreshed from an authoritative fetch
    #[serde(rename_all = "camelCase")]
    Replaced {
        collection: Collection,
        written: usize,
        pending_kept: usize,
    },
    /// A sync pass finished; read caches should be refreshed
    #[serde(rename_all = "camelCase")]
    SyncCompleted {
        synced: usize,
        failed: usize,
        skipped: usize,
    },
}

/// Result of [`LocalStore::save_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAllReport {
    /// Clean records written
    pub written: usize,
    /// Dirty records left in place
    pub pending_kept: usize,
}

/// Result of applying a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The record as stored after the write
    Stored(Envelope),
    /// An unsynced create was deleted and removed outright
    Discarded {
        collection: Collection,
        id: RecordId,
    },
}

/// Durable, collection-keyed store of record envelopes.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: Pool,
    events: broadcast::Sender<StoreEvent>,
}

/// Keep one row per record id; a later duplicate replaces the earlier one.
fn dedup_by_id(rows: Vec<StoredEnvelope>) -> Vec<StoredEnvelope> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<StoredEnvelope> = Vec::with_capacity(rows.len());
    for row in rows {
        match positions.get(&row.record_id) {
            Some(&index) => unique[index] = row,
            None => {
                positions.insert(row.record_id.clone(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis().max(0) as Timestamp
}

impl LocalStore {
    /// Open the store, creating the file and running migrations if needed.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::create_pool(&config.path, config.max_connections).await?;
        db::run_migrations(&pool).await?;

        tracing::info!(path = %config.path.display(), "Local store opened");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { pool, events })
    }

    /// Close the underlying pool. Every clone of this handle stops working.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Local store closed");
    }

    /// Subscribe to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// All non-tombstoned records of a collection, in insertion order.
    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Envelope>> {
        let rows = db::fetch_collection(&self.pool, collection).await?;

        let mut envelopes = Vec::with_capacity(rows.len());
        for row in &rows {
            let envelope = row.to_envelope()?;
            if !envelope.is_tombstone() {
                envelopes.push(envelope);
            }
        }
        Ok(envelopes)
    }

    /// One record, unless it is missing or tombstoned.
    pub async fn get(&self, collection: Collection, id: &str) -> Result<Option<Envelope>> {
        match db::fetch_envelope(&self.pool, collection, id).await? {
            Some(row) => {
                let envelope = row.to_envelope()?;
                Ok((!envelope.is_tombstone()).then_some(envelope))
            }
            None => Ok(None),
        }
    }

    /// Replace the clean contents of a collection with server records.
    ///
    /// Dirty records are never discarded: they stay in place, and a server
    /// record sharing an ID with one of them is not written.
    pub async fn save_all(
        &self,
        collection: Collection,
        records: Vec<Value>,
    ) -> Result<SaveAllReport> {
        let timestamp = now_millis();
        let rows = records
            .into_iter()
            .map(|record| {
                let envelope = Envelope::clean(collection, record, timestamp)?;
                StoredEnvelope::from_envelope(&envelope)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.begin_write().await?;
        db::delete_clean(&mut *tx, collection).await?;

        let mut written = 0;
        for row in dedup_by_id(rows) {
            written += db::upsert_clean(&mut *tx, &row).await? as usize;
        }
        let pending_kept = db::count_dirty(&mut *tx, collection).await? as usize;
        tx.commit().await?;

        if pending_kept > 0 {
            tracing::warn!(
                collection = %collection,
                pending_kept,
                "Authoritative refresh kept unsynced records"
            );
        } else {
            tracing::debug!(collection = %collection, written, "Collection replaced");
        }

        self.notify(StoreEvent::Replaced {
            collection,
            written,
            pending_kept,
        });

        Ok(SaveAllReport {
            written,
            pending_kept,
        })
    }

    /// Store a record created offline. Never touches the network.
    pub async fn add(
        &self,
        collection: Collection,
        endpoint: &str,
        payload: Value,
        encoding: PayloadEncoding,
    ) -> Result<Envelope> {
        let envelope = self
            .apply_create(CreateMutation::new(collection, endpoint, payload, encoding))
            .await?;
        self.queued(&envelope);
        Ok(envelope)
    }

    /// Merge fields into a stored record.
    pub async fn update(
        &self,
        collection: Collection,
        endpoint: &str,
        id: &str,
        payload: Value,
        encoding: PayloadEncoding,
    ) -> Result<Envelope> {
        let envelope = self
            .apply_update(UpdateMutation::new(collection, endpoint, id, payload, encoding))
            .await?;
        self.queued(&envelope);
        Ok(envelope)
    }

    /// Delete a record: unsynced creates vanish, everything else is tombstoned.
    pub async fn delete(
        &self,
        collection: Collection,
        endpoint: &str,
        id: &str,
    ) -> Result<DeleteOutcome> {
        let applied = self
            .apply_delete(DeleteMutation::new(collection, endpoint, id))
            .await?;
        self.report(&applied);
        Ok(match applied {
            Applied::Stored(_) => DeleteOutcome::Tombstoned,
            Applied::Discarded { .. } => DeleteOutcome::Discarded,
        })
    }

    /// Apply a local mutation in one transaction.
    pub async fn apply(&self, mutation: Mutation) -> Result<Applied> {
        let applied = match mutation {
            Mutation::Create(create) => Applied::Stored(self.apply_create(create).await?),
            Mutation::Update(update) => Applied::Stored(self.apply_update(update).await?),
            Mutation::Delete(delete) => self.apply_delete(delete).await?,
        };
        self.report(&applied);
        Ok(applied)
    }

    async fn apply_create(&self, create: CreateMutation) -> Result<Envelope> {
        let id = uuid::Uuid::new_v4().to_string();
        let envelope = create.into_envelope(id, now_millis())?;
        db::insert_envelope(&self.pool, &StoredEnvelope::from_envelope(&envelope)?).await?;
        Ok(envelope)
    }

    async fn apply_update(&self, update: UpdateMutation) -> Result<Envelope> {
        let mut tx = self.begin_write().await?;
        let mut envelope = self
            .load_for_write(&mut tx, update.collection, &update.id)
            .await?;
        update.apply(&mut envelope, now_millis())?;
        db::update_envelope(&mut *tx, &StoredEnvelope::from_envelope(&envelope)?).await?;
        tx.commit().await?;
        Ok(envelope)
    }

    async fn apply_delete(&self, delete: DeleteMutation) -> Result<Applied> {
        let collection = delete.collection;
        let mut tx = self.begin_write().await?;
        let mut envelope = self.load_for_write(&mut tx, collection, &delete.id).await?;

        let applied = match delete.apply(&mut envelope, now_millis())? {
            DeleteOutcome::Discarded => {
                db::delete_envelope(&mut *tx, collection, &envelope.id).await?;
                Applied::Discarded {
                    collection,
                    id: envelope.id,
                }
            }
            DeleteOutcome::Tombstoned => {
                db::update_envelope(&mut *tx, &StoredEnvelope::from_envelope(&envelope)?).await?;
                Applied::Stored(envelope)
            }
        };
        tx.commit().await?;
        Ok(applied)
    }

    fn report(&self, applied: &Applied) {
        match applied {
            Applied::Stored(envelope) => self.queued(envelope),
            Applied::Discarded { collection, id } => {
                tracing::info!(
                    collection = %collection,
                    id = %id,
                    "Unsynced create deleted locally, nothing to relay"
                );
            }
        }
    }

    fn queued(&self, envelope: &Envelope) {
        tracing::info!(
            collection = %envelope.collection(),
            id = %envelope.id,
            state = %envelope.sync_state,
            "Saved locally, queued for sync"
        );
        self.notify(StoreEvent::Queued {
            collection: envelope.collection(),
            id: envelope.id.clone(),
            sync_state: envelope.sync_state,
        });
    }

    /// Start a transaction holding the write lock from its first statement.
    ///
    /// A deferred transaction that reads before writing cannot wait for the
    /// lock in WAL mode and fails with SQLITE_BUSY under concurrent writers.
    async fn begin_write(&self) -> Result<sqlx::Transaction<'static, sqlx::Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn load_for_write(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        collection: Collection,
        id: &str,
    ) -> Result<Envelope> {
        let row = db::fetch_envelope(&mut **tx, collection, id)
            .await?
            .ok_or_else(|| clinic_sync_engine::Error::RecordNotFound {
                collection,
                id: id.to_string(),
            })?;
        row.to_envelope()
    }

    /// Empty a collection unconditionally, pending work included.
    pub async fn clear(&self, collection: Collection) -> Result<u64> {
        let removed = db::delete_collection(&self.pool, collection).await?;
        tracing::warn!(collection = %collection, removed, "Collection cleared");
        Ok(removed)
    }

    /// Every dirty record across all collections, tombstones included.
    ///
    /// Collections are visited in [`Collection::ALL`] order; within a
    /// collection records keep insertion order.
    pub async fn scan_outbox(&self) -> Result<Vec<OutboxEntry>> {
        let mut outbox = Vec::new();
        for collection in Collection::ALL {
            let rows = db::fetch_collection(&self.pool, collection).await?;
            let envelopes = rows
                .iter()
                .map(StoredEnvelope::to_envelope)
                .collect::<Result<Vec<_>>>()?;
            outbox.extend(collect_dirty(collection, envelopes));
        }
        Ok(outbox)
    }

    /// Queued work grouped by collection and state.
    pub async fn outbox_summary(&self) -> Result<OutboxSummary> {
        let outbox = self.scan_outbox().await?;
        Ok(OutboxSummary::from_entries(&outbox))
    }

    /// Number of dirty records across all collections.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(db::count_all_dirty(&self.pool).await? as usize)
    }

    /// Remove a record the server accepted.
    ///
    /// Updates and deletes are removed only if still at `revision`, so an
    /// edit made during dispatch is relayed on the next pass. Creates are
    /// always removed: the server holds the record now and a second POST
    /// would duplicate it.
    ///
    /// Returns whether the record was removed.
    pub async fn acknowledge(
        &self,
        collection: Collection,
        id: &str,
        sync_state: SyncState,
        revision: Revision,
    ) -> Result<bool> {
        if sync_state != SyncState::PendingCreate {
            let removed = db::delete_acknowledged(&self.pool, collection, id, revision).await?;
            return Ok(removed > 0);
        }

        let mut tx = self.begin_write().await?;
        let Some(row) = db::fetch_envelope(&mut *tx, collection, id).await? else {
            return Ok(false);
        };
        let current = row.to_envelope()?;
        if current.sync_state != SyncState::PendingCreate {
            return Ok(false);
        }
        if current.revision != revision {
            tracing::warn!(
                collection = %collection,
                id = %id,
                "Record edited while its create was in flight; the server copy wins"
            );
        }
        db::delete_envelope(&mut *tx, collection, id).await?;
        tx.commit().await?;
        Ok(true)
    }
}
