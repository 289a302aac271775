//! Session boundary: where the bearer token for relay requests comes from.
//!
//! Sessions are issued elsewhere. The agent only reads the current token,
//! and a missing token suppresses all network activity.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::RwLock;

/// A bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token; blank tokens count as no session.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Source of the current session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn token(&self) -> Option<BearerToken>;
}

/// Session token held in memory, updated by the host application.
#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<BearerToken>>,
}

impl MemorySession {
    pub fn new(token: Option<BearerToken>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub async fn set(&self, token: BearerToken) {
        *self.token.write().await = Some(token);
        tracing::info!("Session token updated");
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
        tracing::info!("Session token cleared");
    }

    pub async fn is_active(&self) -> bool {
        self.token.read().await.is_some()
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn token(&self) -> Option<BearerToken> {
        self.token.read().await.clone()
    }
}
