//! Request handlers for the control surface.

mod collections;
mod sync;

pub use collections::*;
pub use sync::*;
