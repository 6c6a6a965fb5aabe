//! Symmetric-wrapped key exchange: fresh session keys sealed under a key
//! both sides already hold.

use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{CryptoContext, SessionCryptoContext, SessionKeys};
use crate::error::{KeyExchangeErrorKind, TrustError, TrustResult};

use super::data::{KeyExchangeScheme, KeyRequestData, KeyResponseParams, SymmetricKeyId};
use super::factory::{
    scheme_mismatch, KeyExchangeFactory, LocalKeyMaterial, PresharedKeyStore, WrapContext,
};

pub struct SymmetricWrappedFactory {
    preshared: Arc<dyn PresharedKeyStore>,
}

impl SymmetricWrappedFactory {
    pub fn new(preshared: Arc<dyn PresharedKeyStore>) -> Self {
        Self { preshared }
    }

    /// Entity side: request keys wrapped under `context`, which must be the
    /// entity's pre-shared context for [`SymmetricKeyId::Psk`] or its live
    /// session context for [`SymmetricKeyId::Session`].
    pub fn initiate(
        key_id: SymmetricKeyId,
        context: Arc<dyn CryptoContext>,
    ) -> (KeyRequestData, LocalKeyMaterial) {
        (
            KeyRequestData::SymmetricWrapped { key_id },
            LocalKeyMaterial::Symmetric { key_id, context },
        )
    }
}

impl KeyExchangeFactory for SymmetricWrappedFactory {
    fn scheme(&self) -> KeyExchangeScheme {
        KeyExchangeScheme::SymmetricWrapped
    }

    fn generate(
        &self,
        request: &KeyRequestData,
        wrap: &WrapContext<'_>,
    ) -> TrustResult<(SessionKeys, KeyResponseParams)> {
        let KeyRequestData::SymmetricWrapped { key_id } = request else {
            return Err(scheme_mismatch(self.scheme(), request.scheme()));
        };

        let keys = SessionKeys::generate()?;
        let wrapped_keys = match key_id {
            SymmetricKeyId::Psk => {
                let psk = self.preshared.preshared_keys(wrap.identity).ok_or_else(|| {
                    TrustError::key_exchange(KeyExchangeErrorKind::MissingPresharedKeys {
                        identity: wrap.identity.to_string(),
                    })
                })?;
                SessionCryptoContext::new(&psk)?.seal(&keys.to_bytes())?
            }
            SymmetricKeyId::Session => {
                let session = wrap
                    .session
                    .ok_or_else(|| TrustError::key_exchange(KeyExchangeErrorKind::MissingSessionContext))?;
                session.seal(&keys.to_bytes())?
            }
        };

        debug!(identity = %wrap.identity, key_id = ?key_id, "Wrapped session keys");
        Ok((
            keys,
            KeyResponseParams::SymmetricWrapped {
                key_id: *key_id,
                wrapped_keys,
            },
        ))
    }

    fn unwrap(
        &self,
        response: &KeyResponseParams,
        local: LocalKeyMaterial,
    ) -> TrustResult<SessionKeys> {
        let KeyResponseParams::SymmetricWrapped {
            key_id,
            wrapped_keys,
        } = response
        else {
            return Err(scheme_mismatch(self.scheme(), response.scheme()));
        };
        let local_scheme = local.scheme();
        let LocalKeyMaterial::Symmetric {
            key_id: local_key_id,
            context,
        } = local
        else {
            return Err(scheme_mismatch(self.scheme(), local_scheme));
        };
        if *key_id != local_key_id {
            return Err(TrustError::invalid_value(
                "key_id",
                format!("response wrapped under {:?}, request asked for {:?}", key_id, local_key_id),
            ));
        }

        let plaintext = Zeroizing::new(context.unseal(wrapped_keys)?);
        SessionKeys::from_bytes(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoErrorKind;
    use std::collections::HashMap;

    fn preshared() -> (SessionKeys, Arc<dyn PresharedKeyStore>) {
        let psk = SessionKeys::generate().unwrap();
        let mut keys = HashMap::new();
        keys.insert("device-1".to_string(), psk.clone());
        (psk, Arc::new(keys))
    }

    #[test]
    fn test_psk_exchange() {
        let (psk, store) = preshared();
        let factory = SymmetricWrappedFactory::new(store);
        let entity_context: Arc<dyn CryptoContext> = Arc::new(SessionCryptoContext::new(&psk).unwrap());

        let (request, local) = SymmetricWrappedFactory::initiate(SymmetricKeyId::Psk, entity_context);
        let wrap = WrapContext {
            identity: "device-1",
            session: None,
        };
        let (keys, params) = factory.generate(&request, &wrap).unwrap();
        let unwrapped = factory.unwrap(&params, local).unwrap();
        assert_eq!(unwrapped.to_bytes().as_slice(), keys.to_bytes().as_slice());
    }

    #[test]
    fn test_unknown_psk_identity() {
        let (_, store) = preshared();
        let factory = SymmetricWrappedFactory::new(store);
        let request = KeyRequestData::SymmetricWrapped {
            key_id: SymmetricKeyId::Psk,
        };
        let wrap = WrapContext {
            identity: "device-2",
            session: None,
        };
        assert!(matches!(
            factory.generate(&request, &wrap),
            Err(TrustError::KeyExchange {
                kind: KeyExchangeErrorKind::MissingPresharedKeys { .. }
            })
        ));
    }

    #[test]
    fn test_session_exchange_requires_context() {
        let (_, store) = preshared();
        let factory = SymmetricWrappedFactory::new(store);
        let request = KeyRequestData::SymmetricWrapped {
            key_id: SymmetricKeyId::Session,
        };
        let wrap = WrapContext {
            identity: "device-1",
            session: None,
        };
        assert!(factory.generate(&request, &wrap).is_err());
    }

    #[test]
    fn test_wrong_local_key_fails_integrity() {
        let (_, store) = preshared();
        let factory = SymmetricWrappedFactory::new(store);
        let session = SessionCryptoContext::new(&SessionKeys::generate().unwrap()).unwrap();
        let wrong: Arc<dyn CryptoContext> =
            Arc::new(SessionCryptoContext::new(&SessionKeys::generate().unwrap()).unwrap());

        let (request, local) = SymmetricWrappedFactory::initiate(SymmetricKeyId::Session, wrong);
        let wrap = WrapContext {
            identity: "device-1",
            session: Some(&session),
        };
        let (_, params) = factory.generate(&request, &wrap).unwrap();
        assert!(matches!(
            factory.unwrap(&params, local),
            Err(TrustError::Crypto {
                kind: CryptoErrorKind::IntegrityCheckFailed
            })
        ));
    }
}
