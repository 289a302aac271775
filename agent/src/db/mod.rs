//! Database module for SQLite persistence of the local store.

mod envelopes;
mod pool;

pub use envelopes::*;
pub use pool::*;
