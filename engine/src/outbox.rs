//! Outbox: the dirty records one sync pass has to relay.

use crate::{Collection, Envelope, SyncState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One unit of work for a sync pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub collection: Collection,
    pub envelope: Envelope,
}

/// Keep only the records that are not reconciled with the server.
///
/// Tombstones are included. Input order is preserved, so feeding envelopes
/// in insertion order keeps the outbox in insertion order.
pub fn collect_dirty<I>(collection: Collection, envelopes: I) -> Vec<OutboxEntry>
where
    I: IntoIterator<Item = Envelope>,
{
    envelopes
        .into_iter()
        .filter(Envelope::is_dirty)
        .map(|envelope| OutboxEntry {
            collection,
            envelope,
        })
        .collect()
}

/// Queued work per collection and per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBacklog {
    pub pending_create: usize,
    pub pending_update: usize,
    pub pending_delete: usize,
    /// Dirty records without an endpoint; these are skipped on every pass
    pub missing_endpoint: usize,
}

impl CollectionBacklog {
    pub fn total(&self) -> usize {
        self.pending_create + self.pending_update + self.pending_delete
    }
}

/// Inspection view of the outbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxSummary {
    pub total: usize,
    pub collections: BTreeMap<Collection, CollectionBacklog>,
}

impl OutboxSummary {
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a OutboxEntry>,
    {
        let mut summary = OutboxSummary::default();
        for entry in entries {
            let backlog = summary.collections.entry(entry.collection).or_default();
            match entry.envelope.sync_state {
                SyncState::PendingCreate => backlog.pending_create += 1,
                SyncState::PendingUpdate => backlog.pending_update += 1,
                SyncState::PendingDelete => backlog.pending_delete += 1,
                SyncState::Clean => continue,
            }
            if entry.envelope.endpoint.is_none() {
                backlog.missing_endpoint += 1;
            }
            summary.total += 1;
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
