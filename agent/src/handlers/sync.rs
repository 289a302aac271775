//! Sync handlers - manual triggers and the session/connectivity boundaries.

use clinic_sync_engine::OutboxSummary;
use serde::{Deserialize, Serialize};

use crate::connectivity::{Connectivity, ConnectivitySignal};
use crate::error::{AppError, Result};
use crate::orchestrator::{Orchestrator, SyncPhase, TriggerReason, TriggerResult};
use crate::session::{BearerToken, MemorySession};
use crate::store::LocalStore;

#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityResponse {
    pub previous: Connectivity,
    pub current: Connectivity,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxResponse {
    pub phase: SyncPhase,
    pub connectivity: Connectivity,
    #[serde(flatten)]
    pub summary: OutboxSummary,
}

/// Run a sync pass now.
pub async fn handle_trigger(orchestrator: &Orchestrator) -> Result<TriggerResult> {
    orchestrator.trigger(TriggerReason::Manual).await
}

/// Report connectivity. Going online starts a pass through the watch loop.
pub fn handle_connectivity(
    signal: &ConnectivitySignal,
    request: ConnectivityRequest,
) -> ConnectivityResponse {
    let current = Connectivity::from_online(request.online);
    let previous = signal.set(current);
    ConnectivityResponse { previous, current }
}

pub async fn handle_set_session(
    session: &MemorySession,
    request: SessionRequest,
) -> Result<SessionResponse> {
    let token = BearerToken::new(request.token)
        .ok_or_else(|| AppError::BadRequest("token must not be empty".to_string()))?;
    session.set(token).await;
    Ok(SessionResponse { active: true })
}

pub async fn handle_clear_session(session: &MemorySession) -> SessionResponse {
    session.clear().await;
    SessionResponse { active: false }
}

pub async fn handle_outbox(
    store: &LocalStore,
    orchestrator: &Orchestrator,
    signal: &ConnectivitySignal,
) -> Result<OutboxResponse> {
    Ok(OutboxResponse {
        phase: orchestrator.phase().await,
        connectivity: signal.current(),
        summary: store.outbox_summary().await?,
    })
}
