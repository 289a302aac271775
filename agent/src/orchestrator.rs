//! Sync orchestration: draining the outbox when connectivity returns.
//!
//! A pass resolves the session, scans the outbox, relays every dirty record
//! concurrently and acknowledges the ones the server accepted. Passes never
//! overlap; a trigger that arrives mid-pass schedules exactly one follow-up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clinic_sync_engine::{plan_request, Collection, OutboxEntry, RecordId, Revision, SyncState};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::connectivity::Connectivity;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::session::{BearerToken, SessionStore};
use crate::store::{LocalStore, StoreEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Syncing,
}

/// What started a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerReason {
    /// Connectivity went from offline to online
    Online,
    /// Requested by the host application
    Manual,
    /// Follow-up for triggers coalesced into a running pass
    FollowUp,
}

/// Result of relaying one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum RecordOutcome {
    Ok,
    /// Dispatched, but the server or the transport failed; stays queued
    Failed(String),
    /// Not dispatched because the record cannot be planned; stays queued
    Skipped(String),
}

impl RecordOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RecordOutcome::Ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    pub collection: Collection,
    pub id: RecordId,
    pub sync_state: SyncState,
    pub revision: Revision,
    pub outcome: RecordOutcome,
    /// Removed from the store after success. False when an update or delete
    /// was written again while its request was in flight, or when removing
    /// the record failed.
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    SessionMissing,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub reason: TriggerReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
    pub records: Vec<RecordReport>,
}

impl PassReport {
    fn finished(
        reason: TriggerReason,
        started_at: DateTime<Utc>,
        records: Vec<RecordReport>,
    ) -> Self {
        Self {
            reason,
            started_at,
            finished_at: Utc::now(),
            aborted: None,
            records,
        }
    }

    fn aborted(reason: TriggerReason, started_at: DateTime<Utc>, abort: AbortReason) -> Self {
        Self {
            reason,
            started_at,
            finished_at: Utc::now(),
            aborted: Some(abort),
            records: Vec::new(),
        }
    }

    pub fn synced(&self) -> usize {
        self.count(|o| o.is_ok())
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Skipped(_)))
    }

    /// Records that were actually sent to the server.
    pub fn dispatched(&self) -> usize {
        self.records.len() - self.skipped()
    }

    pub fn acknowledged(&self) -> usize {
        self.records.iter().filter(|r| r.acknowledged).count()
    }

    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Result of [`Orchestrator::trigger`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "passes", rename_all = "camelCase")]
pub enum TriggerResult {
    /// The caller ran one pass plus any follow-ups requested meanwhile
    Ran(Vec<PassReport>),
    /// A pass was already running; it will run one more when done
    Coalesced,
}

#[derive(Debug)]
struct Coordinator {
    phase: SyncPhase,
    rerun: bool,
}

/// Drives sync passes over a [`LocalStore`].
pub struct Orchestrator {
    store: LocalStore,
    dispatcher: Arc<dyn Dispatcher>,
    session: Arc<dyn SessionStore>,
    coordinator: Mutex<Coordinator>,
}

impl Orchestrator {
    pub fn new(
        store: LocalStore,
        dispatcher: Arc<dyn Dispatcher>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            session,
            coordinator: Mutex::new(Coordinator {
                phase: SyncPhase::Idle,
                rerun: false,
            }),
        }
    }

    pub async fn phase(&self) -> SyncPhase {
        self.coordinator.lock().await.phase
    }

    /// Run a sync pass, or coalesce into the one already running.
    pub async fn trigger(&self, reason: TriggerReason) -> Result<TriggerResult> {
        {
            let mut coordinator = self.coordinator.lock().await;
            if coordinator.phase == SyncPhase::Syncing {
                coordinator.rerun = true;
                tracing::debug!(?reason, "Sync pass in progress, trigger coalesced");
                return Ok(TriggerResult::Coalesced);
            }
            coordinator.phase = SyncPhase::Syncing;
        }

        let mut reports = Vec::new();
        let mut reason = reason;
        loop {
            let pass = self.run_pass(reason).await;

            let mut coordinator = self.coordinator.lock().await;
            match pass {
                Ok(report) => reports.push(report),
                Err(e) => {
                    coordinator.phase = SyncPhase::Idle;
                    coordinator.rerun = false;
                    return Err(e);
                }
            }

            if coordinator.rerun {
                coordinator.rerun = false;
                reason = TriggerReason::FollowUp;
                continue;
            }
            coordinator.phase = SyncPhase::Idle;
            break;
        }

        Ok(TriggerResult::Ran(reports))
    }

    async fn run_pass(&self, reason: TriggerReason) -> Result<PassReport> {
        let started_at = Utc::now();

        let Some(token) = self.session.token().await else {
            tracing::warn!(?reason, "No active session, sync pass aborted");
            return Ok(PassReport::aborted(
                reason,
                started_at,
                AbortReason::SessionMissing,
            ));
        };

        let outbox = self.store.scan_outbox().await?;
        if outbox.is_empty() {
            tracing::debug!(?reason, "Outbox empty, nothing to sync");
            return Ok(PassReport::finished(reason, started_at, Vec::new()));
        }

        tracing::info!(?reason, pending = outbox.len(), "Sync pass started");

        let mut records = join_all(outbox.iter().map(|entry| self.relay(entry, &token))).await;

        // An acknowledgment that fails leaves its record queued for the next
        // pass; the remaining records are still acknowledged.
        for record in records.iter_mut().filter(|r| r.outcome.is_ok()) {
            match self
                .store
                .acknowledge(record.collection, &record.id, record.sync_state, record.revision)
                .await
            {
                Ok(true) => record.acknowledged = true,
                Ok(false) => tracing::info!(
                    collection = %record.collection,
                    id = %record.id,
                    "Record changed during dispatch, kept for the next pass"
                ),
                Err(e) => tracing::error!(
                    collection = %record.collection,
                    id = %record.id,
                    error = %e,
                    "Acknowledgment failed, record stays queued"
                ),
            }
        }

        let report = PassReport::finished(reason, started_at, records);
        tracing::info!(
            synced = report.synced(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Sync pass finished"
        );
        self.store.notify(StoreEvent::SyncCompleted {
            synced: report.synced(),
            failed: report.failed(),
            skipped: report.skipped(),
        });

        Ok(report)
    }

    async fn relay(&self, entry: &OutboxEntry, token: &BearerToken) -> RecordReport {
        let envelope = &entry.envelope;

        let outcome = match plan_request(envelope) {
            Err(e) => {
                tracing::error!(
                    collection = %entry.collection,
                    id = %envelope.id,
                    error = %e,
                    "Queued record cannot be relayed"
                );
                RecordOutcome::Skipped(e.to_string())
            }
            Ok(plan) => match self.dispatcher.dispatch(&plan, token).await {
                Ok(()) => {
                    tracing::debug!(
                        collection = %entry.collection,
                        id = %envelope.id,
                        "Relayed"
                    );
                    RecordOutcome::Ok
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %entry.collection,
                        id = %envelope.id,
                        error = %e,
                        "Relay failed, record stays queued"
                    );
                    RecordOutcome::Failed(e.to_string())
                }
            },
        };

        RecordReport {
            collection: entry.collection,
            id: envelope.id.clone(),
            sync_state: envelope.sync_state,
            revision: envelope.revision,
            outcome,
            acknowledged: false,
        }
    }

    /// Trigger a pass on every offline to online transition.
    ///
    /// If the signal already reads online, one pass runs right away. The
    /// task ends when the signal's sender is dropped.
    pub fn watch(
        self: Arc<Self>,
        mut connectivity: watch::Receiver<Connectivity>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut online = connectivity.borrow_and_update().is_online();
            if online {
                self.spawn_trigger(TriggerReason::Online);
            }

            while connectivity.changed().await.is_ok() {
                let now_online = connectivity.borrow_and_update().is_online();
                if now_online && !online {
                    self.spawn_trigger(TriggerReason::Online);
                }
                online = now_online;
            }

            tracing::debug!("Connectivity signal closed, watch loop exiting");
        })
    }

    // Triggers run on their own task so the watch loop keeps observing
    // transitions during a pass.
    fn spawn_trigger(self: &Arc<Self>, reason: TriggerReason) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.trigger(reason).await {
                tracing::error!(error = %e, "Sync pass failed");
            }
        });
    }
}
