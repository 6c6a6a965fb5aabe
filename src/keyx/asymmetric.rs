//! Asymmetric-wrapped key exchange.
//!
//! The entity sends an X25519 public value. The authority generates random
//! session keys and seals them under a wrapping context derived from an
//! ephemeral agreement with that value; only the holder of the entity's
//! private key can derive the same wrapping context.

use zeroize::Zeroizing;

use crate::crypto::{CryptoContext, SessionCryptoContext, SessionKeys};
use crate::error::{KeyExchangeErrorKind, TrustError, TrustResult};

use super::data::{KeyExchangeScheme, KeyRequestData, KeyResponseParams};
use super::ecdh::{agree_session_keys, generate_ephemeral, transcript};
use super::factory::{scheme_mismatch, KeyExchangeFactory, LocalKeyMaterial, WrapContext};

const WRAP_INFO: &[u8] = b"trustline asymmetric-wrap v1";

#[derive(Debug, Default, Clone, Copy)]
pub struct AsymmetricWrappedFactory;

impl AsymmetricWrappedFactory {
    pub fn new() -> Self {
        Self
    }

    /// Entity side: generate the key pair whose public value goes in the
    /// request.
    pub fn initiate(key_pair_id: &str) -> TrustResult<(KeyRequestData, LocalKeyMaterial)> {
        let (private_key, public_key) = generate_ephemeral()?;
        Ok((
            KeyRequestData::AsymmetricWrapped {
                key_pair_id: key_pair_id.to_string(),
                public_key: public_key.clone(),
            },
            LocalKeyMaterial::Ephemeral {
                scheme: KeyExchangeScheme::AsymmetricWrapped,
                id: key_pair_id.to_string(),
                public_key,
                private_key,
            },
        ))
    }
}

impl KeyExchangeFactory for AsymmetricWrappedFactory {
    fn scheme(&self) -> KeyExchangeScheme {
        KeyExchangeScheme::AsymmetricWrapped
    }

    fn generate(
        &self,
        request: &KeyRequestData,
        _wrap: &WrapContext<'_>,
    ) -> TrustResult<(SessionKeys, KeyResponseParams)> {
        let KeyRequestData::AsymmetricWrapped {
            key_pair_id,
            public_key,
        } = request
        else {
            return Err(scheme_mismatch(self.scheme(), request.scheme()));
        };

        let (ephemeral_private, ephemeral_public) = generate_ephemeral()?;
        let salt = transcript(public_key, &ephemeral_public);
        let wrapping = agree_session_keys(ephemeral_private, public_key, &salt, WRAP_INFO)?;

        let keys = SessionKeys::generate()?;
        let wrapped_keys = SessionCryptoContext::new(&wrapping)?.seal(&keys.to_bytes())?;
        Ok((
            keys,
            KeyResponseParams::AsymmetricWrapped {
                key_pair_id: key_pair_id.clone(),
                ephemeral_public_key: ephemeral_public,
                wrapped_keys,
            },
        ))
    }

    fn unwrap(
        &self,
        response: &KeyResponseParams,
        local: LocalKeyMaterial,
    ) -> TrustResult<SessionKeys> {
        let KeyResponseParams::AsymmetricWrapped {
            key_pair_id,
            ephemeral_public_key,
            wrapped_keys,
        } = response
        else {
            return Err(scheme_mismatch(self.scheme(), response.scheme()));
        };
        let local_scheme = local.scheme();
        let LocalKeyMaterial::Ephemeral {
            scheme: KeyExchangeScheme::AsymmetricWrapped,
            id,
            public_key,
            private_key,
        } = local
        else {
            return Err(scheme_mismatch(self.scheme(), local_scheme));
        };
        if *key_pair_id != id {
            return Err(TrustError::key_exchange(KeyExchangeErrorKind::InvalidPublicValue {
                message: format!("response for key pair '{}', expected '{}'", key_pair_id, id),
            }));
        }

        let salt = transcript(&public_key, ephemeral_public_key);
        let wrapping = agree_session_keys(private_key, ephemeral_public_key, &salt, WRAP_INFO)?;
        let plaintext = Zeroizing::new(SessionCryptoContext::new(&wrapping)?.unseal(wrapped_keys)?);
        SessionKeys::from_bytes(&plaintext)
    }
}
