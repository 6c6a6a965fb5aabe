//! Key exchange factory trait and the material each side brings to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ring::agreement::EphemeralPrivateKey;

use crate::crypto::{CryptoContext, SessionKeys};
use crate::error::{KeyExchangeErrorKind, TrustError, TrustResult};

use super::data::{KeyExchangeScheme, KeyRequestData, KeyResponseParams, SymmetricKeyId};

/// Lookup of pre-shared entity keys.
pub trait PresharedKeyStore: Send + Sync {
    fn preshared_keys(&self, identity: &str) -> Option<SessionKeys>;
}

impl PresharedKeyStore for HashMap<String, SessionKeys> {
    fn preshared_keys(&self, identity: &str) -> Option<SessionKeys> {
        self.get(identity).cloned()
    }
}

/// Authority-side inputs to key generation beyond the request itself.
pub struct WrapContext<'a> {
    /// Authenticated identity of the requesting entity.
    pub identity: &'a str,
    /// Crypto context of the presented master token, when there is one.
    pub session: Option<&'a dyn CryptoContext>,
}

/// Entity-side secret kept between sending a key request and receiving the
/// response.
pub enum LocalKeyMaterial {
    Symmetric {
        key_id: SymmetricKeyId,
        context: Arc<dyn CryptoContext>,
    },
    Ephemeral {
        scheme: KeyExchangeScheme,
        /// Key pair or parameters identifier sent with the request.
        id: String,
        public_key: Vec<u8>,
        private_key: EphemeralPrivateKey,
    },
}

impl LocalKeyMaterial {
    pub fn scheme(&self) -> KeyExchangeScheme {
        match self {
            LocalKeyMaterial::Symmetric { .. } => KeyExchangeScheme::SymmetricWrapped,
            LocalKeyMaterial::Ephemeral { scheme, .. } => *scheme,
        }
    }
}

impl fmt::Debug for LocalKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalKeyMaterial::Symmetric { key_id, .. } => f
                .debug_struct("Symmetric")
                .field("key_id", key_id)
                .finish_non_exhaustive(),
            LocalKeyMaterial::Ephemeral { scheme, id, .. } => f
                .debug_struct("Ephemeral")
                .field("scheme", scheme)
                .field("id", id)
                .finish_non_exhaustive(),
        }
    }
}

/// One key exchange scheme.
///
/// `generate` runs on the authority and must not mutate shared state: a
/// message rejected after key generation leaves nothing behind.
pub trait KeyExchangeFactory: Send + Sync {
    fn scheme(&self) -> KeyExchangeScheme;

    /// Produce fresh session keys and the parameters that let the entity
    /// recover them.
    fn generate(
        &self,
        request: &KeyRequestData,
        wrap: &WrapContext<'_>,
    ) -> TrustResult<(SessionKeys, KeyResponseParams)>;

    /// Recover the session keys from a response using the entity's local
    /// key material.
    fn unwrap(
        &self,
        response: &KeyResponseParams,
        local: LocalKeyMaterial,
    ) -> TrustResult<SessionKeys>;
}

pub(crate) fn scheme_mismatch(expected: KeyExchangeScheme, actual: KeyExchangeScheme) -> TrustError {
    TrustError::key_exchange(KeyExchangeErrorKind::SchemeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

/// Entity-side choice of key exchange for the next request.
pub enum KeyExchangeChoice {
    SymmetricWrapped {
        key_id: SymmetricKeyId,
        context: Arc<dyn CryptoContext>,
    },
    AsymmetricWrapped {
        key_pair_id: String,
    },
    DiffieHellman,
}

/// Build the request data and the local material needed to unwrap the
/// matching response.
pub fn initiate(choice: KeyExchangeChoice) -> TrustResult<(KeyRequestData, LocalKeyMaterial)> {
    match choice {
        KeyExchangeChoice::SymmetricWrapped { key_id, context } => {
            Ok(super::SymmetricWrappedFactory::initiate(key_id, context))
        }
        KeyExchangeChoice::AsymmetricWrapped { key_pair_id } => {
            super::AsymmetricWrappedFactory::initiate(&key_pair_id)
        }
        KeyExchangeChoice::DiffieHellman => super::DiffieHellmanFactory::initiate(),
    }
}
