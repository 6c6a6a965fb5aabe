//! User authentication.

mod authenticator;
mod data;
mod registry;

pub use authenticator::{StaticPasswordAuthenticator, UserAuthenticator, UserIdTokenAuthenticator};
pub use data::{UserAuthData, UserAuthScheme};
pub use registry::UserAuthRegistry;
