//! Registry of key exchange factories keyed by scheme.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{KeyExchangeErrorKind, TrustError, TrustResult};

use super::asymmetric::AsymmetricWrappedFactory;
use super::data::KeyExchangeScheme;
use super::diffie_hellman::DiffieHellmanFactory;
use super::factory::{KeyExchangeFactory, PresharedKeyStore};
use super::symmetric::SymmetricWrappedFactory;

/// Key exchange factories by scheme.
#[derive(Clone, Default)]
pub struct KeyExchangeRegistry {
    factories: HashMap<KeyExchangeScheme, Arc<dyn KeyExchangeFactory>>,
}

impl KeyExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All three built-in schemes, with pre-shared keys from `preshared`.
    pub fn with_defaults(preshared: Arc<dyn PresharedKeyStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SymmetricWrappedFactory::new(preshared)));
        registry.register(Arc::new(AsymmetricWrappedFactory::new()));
        registry.register(Arc::new(DiffieHellmanFactory::new()));
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn KeyExchangeFactory>) {
        let scheme = factory.scheme();
        debug!(scheme = %scheme, "Registering key exchange factory");
        self.factories.insert(scheme, factory);
    }

    pub fn get(&self, scheme: KeyExchangeScheme) -> TrustResult<Arc<dyn KeyExchangeFactory>> {
        self.factories.get(&scheme).cloned().ok_or_else(|| {
            warn!(scheme = %scheme, "Key exchange scheme not supported");
            TrustError::key_exchange(KeyExchangeErrorKind::SchemeNotSupported {
                scheme: scheme.to_string(),
            })
        })
    }

    pub fn schemes(&self) -> Vec<KeyExchangeScheme> {
        self.factories.keys().copied().collect()
    }
}
