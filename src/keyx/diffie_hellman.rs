//! Diffie-Hellman key exchange over X25519.
//!
//! Both sides contribute an ephemeral public value and derive the session
//! keys from the shared secret. Nothing is wrapped.

use crate::crypto::SessionKeys;
use crate::error::{KeyExchangeErrorKind, TrustError, TrustResult};

use super::data::{KeyExchangeScheme, KeyRequestData, KeyResponseParams};
use super::ecdh::{agree_session_keys, generate_ephemeral, transcript};
use super::factory::{scheme_mismatch, KeyExchangeFactory, LocalKeyMaterial, WrapContext};

const SESSION_INFO: &[u8] = b"trustline diffie-hellman session keys v1";

/// The only supported parameters identifier.
pub const X25519_PARAMETERS_ID: &str = "X25519";

#[derive(Debug, Default, Clone, Copy)]
pub struct DiffieHellmanFactory;

impl DiffieHellmanFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn initiate() -> TrustResult<(KeyRequestData, LocalKeyMaterial)> {
        let (private_key, public_key) = generate_ephemeral()?;
        Ok((
            KeyRequestData::DiffieHellman {
                parameters_id: X25519_PARAMETERS_ID.to_string(),
                public_key: public_key.clone(),
            },
            LocalKeyMaterial::Ephemeral {
                scheme: KeyExchangeScheme::DiffieHellman,
                id: X25519_PARAMETERS_ID.to_string(),
                public_key,
                private_key,
            },
        ))
    }
}

fn check_parameters(parameters_id: &str) -> TrustResult<()> {
    if parameters_id != X25519_PARAMETERS_ID {
        return Err(TrustError::key_exchange(KeyExchangeErrorKind::InvalidPublicValue {
            message: format!("unsupported parameters '{}'", parameters_id),
        }));
    }
    Ok(())
}

impl KeyExchangeFactory for DiffieHellmanFactory {
    fn scheme(&self) -> KeyExchangeScheme {
        KeyExchangeScheme::DiffieHellman
    }

    fn generate(
        &self,
        request: &KeyRequestData,
        _wrap: &WrapContext<'_>,
    ) -> TrustResult<(SessionKeys, KeyResponseParams)> {
        let KeyRequestData::DiffieHellman {
            parameters_id,
            public_key,
        } = request
        else {
            return Err(scheme_mismatch(self.scheme(), request.scheme()));
        };
        check_parameters(parameters_id)?;

        let (private_key, own_public) = generate_ephemeral()?;
        let salt = transcript(public_key, &own_public);
        let keys = agree_session_keys(private_key, public_key, &salt, SESSION_INFO)?;
        Ok((
            keys,
            KeyResponseParams::DiffieHellman {
                parameters_id: parameters_id.clone(),
                public_key: own_public,
            },
        ))
    }

    fn unwrap(
        &self,
        response: &KeyResponseParams,
        local: LocalKeyMaterial,
    ) -> TrustResult<SessionKeys> {
        let KeyResponseParams::DiffieHellman {
            parameters_id,
            public_key: peer_public,
        } = response
        else {
            return Err(scheme_mismatch(self.scheme(), response.scheme()));
        };
        let local_scheme = local.scheme();
        let LocalKeyMaterial::Ephemeral {
            scheme: KeyExchangeScheme::DiffieHellman,
            public_key,
            private_key,
            ..
        } = local
        else {
            return Err(scheme_mismatch(self.scheme(), local_scheme));
        };
        check_parameters(parameters_id)?;

        let salt = transcript(&public_key, peer_public);
        agree_session_keys(private_key, peer_public, &salt, SESSION_INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap() -> WrapContext<'static> {
        WrapContext {
            identity: "device-1",
            session: None,
        }
    }

    #[test]
    fn test_exchange() {
        let factory = DiffieHellmanFactory::new();
        let (request, local) = DiffieHellmanFactory::initiate().unwrap();
        let (keys, params) = factory.generate(&request, &wrap()).unwrap();

        let derived = factory.unwrap(&params, local).unwrap();
        assert_eq!(derived.to_bytes().as_slice(), keys.to_bytes().as_slice());
    }

    #[test]
    fn test_unknown_parameters_rejected() {
        let factory = DiffieHellmanFactory::new();
        let (request, _) = DiffieHellmanFactory::initiate().unwrap();
        let KeyRequestData::DiffieHellman { public_key, .. } = request else {
            unreachable!()
        };
        let request = KeyRequestData::DiffieHellman {
            parameters_id: "MODP-2048".to_string(),
            public_key,
        };
        assert!(factory.generate(&request, &wrap()).is_err());
    }

    #[test]
    fn test_local_material_scheme_checked() {
        let factory = DiffieHellmanFactory::new();
        let (request, _) = DiffieHellmanFactory::initiate().unwrap();
        let (_, params) = factory.generate(&request, &wrap()).unwrap();
        let (_, asymmetric_local) = super::super::AsymmetricWrappedFactory::initiate("k").unwrap();

        assert!(matches!(
            factory.unwrap(&params, asymmetric_local),
            Err(TrustError::KeyExchange {
                kind: KeyExchangeErrorKind::SchemeMismatch { .. }
            })
        ));
    }
}
