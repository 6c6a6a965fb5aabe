//! Entity authentication.
//!
//! Scheme-tagged credential claims and the authenticators that turn them
//! into a verified entity identity.

mod authenticator;
mod data;
mod registry;

pub use authenticator::{EntityAuthenticator, PresharedKeyAuthenticator, UnauthenticatedAuthenticator};
pub use data::{EntityAuthData, EntityAuthScheme};
pub use registry::EntityAuthRegistry;
