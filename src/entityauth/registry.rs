//! Registry of entity authenticators keyed by scheme.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AuthErrorKind, TrustError, TrustResult};

use super::authenticator::{EntityAuthenticator, UnauthenticatedAuthenticator};
use super::data::{EntityAuthData, EntityAuthScheme};

/// Entity authenticators by scheme.
#[derive(Clone, Default)]
pub struct EntityAuthRegistry {
    authenticators: HashMap<EntityAuthScheme, Arc<dyn EntityAuthenticator>>,
}

impl EntityAuthRegistry {
    /// An empty registry: every scheme is unsupported.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry accepting unauthenticated (`None`) entities only.
    pub fn with_unauthenticated() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UnauthenticatedAuthenticator));
        registry
    }

    /// Register an authenticator, replacing any for the same scheme.
    pub fn register(&mut self, authenticator: Arc<dyn EntityAuthenticator>) {
        let scheme = authenticator.scheme();
        debug!(scheme = %scheme, "Registering entity authenticator");
        self.authenticators.insert(scheme, authenticator);
    }

    pub fn get(&self, scheme: EntityAuthScheme) -> Option<Arc<dyn EntityAuthenticator>> {
        self.authenticators.get(&scheme).cloned()
    }

    /// Dispatch to the authenticator for the data's scheme.
    pub fn verify(&self, data: &EntityAuthData) -> TrustResult<String> {
        let scheme = data.scheme();
        let authenticator = self.authenticators.get(&scheme).ok_or_else(|| {
            warn!(scheme = %scheme, identity = %data.identity(), "Entity authentication scheme not supported");
            TrustError::Auth {
                kind: AuthErrorKind::EntitySchemeNotSupported {
                    scheme: scheme.to_string(),
                },
            }
        })?;

        authenticator.verify(data)
    }

    pub fn schemes(&self) -> Vec<EntityAuthScheme> {
        self.authenticators.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectAll;

    impl EntityAuthenticator for RejectAll {
        fn scheme(&self) -> EntityAuthScheme {
            EntityAuthScheme::X509
        }

        fn verify(&self, data: &EntityAuthData) -> TrustResult<String> {
            Err(TrustError::Auth {
                kind: AuthErrorKind::EntityRejected {
                    identity: data.identity().to_string(),
                    message: "revoked".to_string(),
                },
            })
        }
    }

    #[test]
    fn test_unsupported_scheme() {
        let registry = EntityAuthRegistry::with_unauthenticated();
        let data = EntityAuthData::Psk {
            identity: "device-1".to_string(),
        };
        assert!(matches!(
            registry.verify(&data),
            Err(TrustError::Auth {
                kind: AuthErrorKind::EntitySchemeNotSupported { .. }
            })
        ));
    }

    #[test]
    fn test_dispatch_by_scheme() {
        let mut registry = EntityAuthRegistry::with_unauthenticated();
        registry.register(Arc::new(RejectAll));

        let none = EntityAuthData::None {
            identity: "kiosk".to_string(),
        };
        assert_eq!(registry.verify(&none).unwrap(), "kiosk");

        let x509 = EntityAuthData::X509 {
            identity: "device-9".to_string(),
            certificate: vec![0x30],
        };
        assert!(registry.verify(&x509).is_err());
        assert_eq!(registry.schemes().len(), 2);
    }
}
