//! The trust authority.
//!
//! [`Authority`] runs the master token state machine for every entity:
//! first-contact authentication, ordinary validation, renewal and the
//! errors that force an entity back to the start.

mod context;
mod processor;
mod state;

pub use context::AuthorityContext;
pub use processor::{Authority, Processed};
pub use state::TrustState;
