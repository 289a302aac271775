//! # Clinic Sync Engine
//!
//! Pure logic for the offline outbox of the clinic-management client.
//!
//! When connectivity drops, users keep viewing cached records and keep
//! submitting creates, updates and deletes. Those writes are stored locally as
//! dirty envelopes and relayed to the server once connectivity returns. This
//! crate holds the rules of that process; the IO (embedded store, HTTP,
//! orchestration) lives in `clinic-sync-agent`.
//!
//! ## Design Principles
//!
//! - **No IO**: no files, no network, no clock; timestamps are passed in
//! - **Exhaustive**: collections, sync states and encodings are closed enums
//! - **Testable**: every transition is a plain function over values
//!
//! ## Core Concepts
//!
//! ### Envelopes
//!
//! Each stored record is an [`Envelope`]: a [`Payload`] tagged with its
//! [`Collection`], a [`SyncState`], the relative endpoint of its pending
//! mutation and the [`PayloadEncoding`] used to relay it.
//!
//! ### Mutations
//!
//! Local writes are [`Mutation`]s. Their transitions keep two invariants:
//! a `pendingCreate` record that is edited stays a create, and one that is
//! deleted disappears instead of becoming a tombstone.
//!
//! ### Outbox and requests
//!
//! [`collect_dirty`] selects the records a sync pass must relay, and
//! [`plan_request`] turns one of them into a [`RequestPlan`] whose body is
//! produced by an [`Encoder`] ([`JsonEncoder`] or [`MultipartEncoder`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use clinic_sync_engine::{
//!     plan_request, Collection, CreateMutation, HttpMethod, PayloadEncoding, SyncState,
//! };
//! use serde_json::json;
//!
//! let envelope = CreateMutation::new(
//!     Collection::Suppliers,
//!     "supplier/create-supplier",
//!     json!({"name": "Acme"}),
//!     PayloadEncoding::Json,
//! )
//! .into_envelope("3f0c2a4e-local", 1706745600000)
//! .unwrap();
//! assert_eq!(envelope.sync_state, SyncState::PendingCreate);
//!
//! let plan = plan_request(&envelope).unwrap();
//! assert_eq!(plan.method, HttpMethod::Post);
//! assert_eq!(plan.path, "supplier/create-supplier");
//! ```

pub mod collection;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod mutation;
pub mod outbox;
pub mod request;

// Re-export main types at crate root
pub use collection::{Collection, KEY_FIELD, RESERVED_FIELDS};
pub use encoder::{
    encoder_for, Encoder, FormField, JsonEncoder, MultipartEncoder, RequestBody,
    JSON_CONTENT_TYPE, MULTIPART_CONTENT_TYPE,
};
pub use envelope::{Envelope, Payload, PayloadEncoding, SyncState};
pub use error::{Error, Result};
pub use mutation::{CreateMutation, DeleteMutation, DeleteOutcome, Mutation, UpdateMutation};
pub use outbox::{collect_dirty, CollectionBacklog, OutboxEntry, OutboxSummary};
pub use request::{plan_request, HttpMethod, RequestPlan};

/// Type aliases for clarity
pub type RecordId = String;
pub type Revision = u64;
pub type Timestamp = u64;
