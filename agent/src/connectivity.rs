//! Connectivity boundary.
//!
//! The agent does not poll the network. The host application reports
//! online/offline transitions and the orchestrator subscribes to them.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Connectivity::Online)
    }
}

/// Latest connectivity reported by the host, shared with subscribers.
#[derive(Debug)]
pub struct ConnectivitySignal {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivitySignal {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Report the current connectivity. Returns the previous value.
    pub fn set(&self, connectivity: Connectivity) -> Connectivity {
        let previous = self.tx.send_replace(connectivity);
        if previous != connectivity {
            tracing::info!(?previous, current = ?connectivity, "Connectivity changed");
        }
        previous
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}
