//! Registry of user authenticators keyed by scheme.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::crypto::AuthorityKeys;
use crate::error::{AuthErrorKind, TrustError, TrustResult};

use super::authenticator::{UserAuthenticator, UserIdTokenAuthenticator};
use super::data::{UserAuthData, UserAuthScheme};

/// User authenticators by scheme.
#[derive(Clone, Default)]
pub struct UserAuthRegistry {
    authenticators: HashMap<UserAuthScheme, Arc<dyn UserAuthenticator>>,
}

impl UserAuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in user ID token authenticator.
    pub fn with_defaults(authority: Arc<AuthorityKeys>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UserIdTokenAuthenticator::new(authority)));
        registry
    }

    pub fn register(&mut self, authenticator: Arc<dyn UserAuthenticator>) {
        let scheme = authenticator.scheme();
        debug!(scheme = %scheme, "Registering user authenticator");
        self.authenticators.insert(scheme, authenticator);
    }

    pub fn get(&self, scheme: UserAuthScheme) -> Option<Arc<dyn UserAuthenticator>> {
        self.authenticators.get(&scheme).cloned()
    }

    /// Dispatch to the authenticator for the data's scheme.
    pub fn verify(&self, entity_identity: &str, data: &UserAuthData) -> TrustResult<String> {
        let scheme = data.scheme();
        let Some(authenticator) = self.authenticators.get(&scheme) else {
            warn!(scheme = %scheme, entity = %entity_identity, "User authentication scheme not supported");
            return Err(TrustError::Auth {
                kind: AuthErrorKind::UserSchemeNotSupported {
                    scheme: scheme.to_string(),
                },
            });
        };
        authenticator.verify(entity_identity, data)
    }
}
