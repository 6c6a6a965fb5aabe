//! Entity authenticator trait and built-in authenticators.

use std::sync::Arc;

use crate::error::{AuthErrorKind, TrustError, TrustResult};
use crate::keyx::PresharedKeyStore;

use super::data::{EntityAuthData, EntityAuthScheme};

/// Verifies entity credentials for one scheme.
///
/// Credential checking itself (certificate chains, key registries) lives
/// behind implementations of this trait; the protocol only consumes the
/// verified identity.
pub trait EntityAuthenticator: Send + Sync {
    /// The scheme this authenticator handles.
    fn scheme(&self) -> EntityAuthScheme;

    /// Verify the claim and return the authenticated identity.
    fn verify(&self, data: &EntityAuthData) -> TrustResult<String>;
}

fn wrong_scheme(expected: EntityAuthScheme, data: &EntityAuthData) -> TrustError {
    TrustError::Auth {
        kind: AuthErrorKind::EntityRejected {
            identity: data.identity().to_string(),
            message: format!("expected {} data, got {}", expected, data.scheme()),
        },
    }
}

/// Accepts any `None`-scheme claim at face value.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnauthenticatedAuthenticator;

impl EntityAuthenticator for UnauthenticatedAuthenticator {
    fn scheme(&self) -> EntityAuthScheme {
        EntityAuthScheme::None
    }

    fn verify(&self, data: &EntityAuthData) -> TrustResult<String> {
        match data {
            EntityAuthData::None { identity } => Ok(identity.clone()),
            other => Err(wrong_scheme(EntityAuthScheme::None, other)),
        }
    }
}

/// Accepts `Psk` claims for identities the key store knows.
///
/// Possession of the key is proven later, when the entity unwraps session
/// keys wrapped under it.
pub struct PresharedKeyAuthenticator {
    keys: Arc<dyn PresharedKeyStore>,
}

impl PresharedKeyAuthenticator {
    pub fn new(keys: Arc<dyn PresharedKeyStore>) -> Self {
        Self { keys }
    }
}

impl EntityAuthenticator for PresharedKeyAuthenticator {
    fn scheme(&self) -> EntityAuthScheme {
        EntityAuthScheme::Psk
    }

    fn verify(&self, data: &EntityAuthData) -> TrustResult<String> {
        let EntityAuthData::Psk { identity } = data else {
            return Err(wrong_scheme(EntityAuthScheme::Psk, data));
        };

        if self.keys.preshared_keys(identity).is_none() {
            return Err(TrustError::Auth {
                kind: AuthErrorKind::EntityRejected {
                    identity: identity.clone(),
                    message: "unknown pre-shared key identity".to_string(),
                },
            });
        }
        Ok(identity.clone())
    }
}
