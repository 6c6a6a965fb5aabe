//! Trustline
//!
//! Mutual trust between entities and an authority based on master tokens.
//!
//! An entity authenticates once with [`entityauth::EntityAuthData`] and a
//! key request. The [`authority::Authority`] answers with a
//! [`tokens::MasterToken`] and session keys delivered through one of the
//! [`keyx`] schemes. Later messages present the master token and are
//! signed with its session keys; a renewable message with a key request
//! yields the next generation of the token under the same serial number.
//! Generations are ordered by a sequence number in a wraparound space
//! of 2^53 values.

pub mod authority;
pub mod config;
pub mod crypto;
pub mod entity;
pub mod entityauth;
pub mod error;
pub mod keyx;
pub mod logging;
pub mod protocol;
pub mod store;
pub mod tokens;
pub mod userauth;

pub use authority::{Authority, AuthorityContext, TrustState};
pub use entity::{EntitySession, RequestOptions};
pub use error::{TrustError, TrustResult};
