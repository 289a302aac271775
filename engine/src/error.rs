//! Error types for the clinic sync engine.

use crate::{Collection, RecordId};
use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("record not found: {collection}/{id}")]
    RecordNotFound {
        collection: Collection,
        id: RecordId,
    },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unknown payload encoding: {0}")]
    InvalidEncoding(String),

    #[error("unknown sync state: {0}")]
    InvalidSyncState(String),

    // Dispatch planning errors
    #[error("dirty record {collection}/{id} has no endpoint")]
    MissingEndpoint {
        collection: Collection,
        id: RecordId,
    },

    #[error("record {collection}/{id} is clean, nothing to sync")]
    NothingToSync {
        collection: Collection,
        id: RecordId,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
