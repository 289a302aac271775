//! Clinic Sync Agent - offline persistence and outbox relay.
//!
//! The agent keeps the clinic client's records in a local SQLite store, queues
//! writes made while offline and relays them to the clinic API once the host
//! reports connectivity. A small HTTP control surface exposes the store and
//! the sync triggers to the host application.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod routes;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::connectivity::ConnectivitySignal;
use crate::dispatcher::Dispatcher;
use crate::orchestrator::Orchestrator;
use crate::session::MemorySession;
use crate::store::LocalStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: LocalStore,
    pub orchestrator: Arc<Orchestrator>,
    pub session: Arc<MemorySession>,
    pub connectivity: Arc<ConnectivitySignal>,
}

impl AppState {
    /// Wire an orchestrator over `store`, reading tokens from `session`.
    pub fn new(
        store: LocalStore,
        dispatcher: Arc<dyn Dispatcher>,
        session: Arc<MemorySession>,
        connectivity: Arc<ConnectivitySignal>,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            dispatcher,
            session.clone(),
        ));
        Self {
            store,
            orchestrator,
            session,
            connectivity,
        }
    }
}

/// Build the control surface router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
