//! Shared mutable state of the protocol: live trust contexts and the
//! replay record.

mod replay;
mod trust_store;

pub use replay::ReplayGuard;
pub use trust_store::{EntityGuard, TrustEntry, TrustStore};
