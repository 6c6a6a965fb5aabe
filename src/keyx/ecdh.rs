//! X25519 agreement shared by the asymmetric-wrap and Diffie-Hellman schemes.

use ring::agreement::{self, EphemeralPrivateKey, UnparsedPublicKey, X25519};
use ring::rand::SystemRandom;
use zeroize::Zeroizing;

use crate::crypto::{derive_key_material, SessionKeys, KEY_LEN};
use crate::error::{CryptoErrorKind, KeyExchangeErrorKind, TrustError, TrustResult};

/// X25519 public value length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Fresh ephemeral key pair; returns the private key and encoded public value.
pub(crate) fn generate_ephemeral() -> TrustResult<(EphemeralPrivateKey, Vec<u8>)> {
    let rng = SystemRandom::new();
    let random_failed = |_| TrustError::Crypto {
        kind: CryptoErrorKind::RandomFailed,
    };
    let private_key = EphemeralPrivateKey::generate(&X25519, &rng).map_err(random_failed)?;
    let public_key = private_key.compute_public_key().map_err(random_failed)?;
    Ok((private_key, public_key.as_ref().to_vec()))
}

fn invalid_public(message: &str) -> TrustError {
    TrustError::key_exchange(KeyExchangeErrorKind::InvalidPublicValue {
        message: message.to_string(),
    })
}

/// Agree with `peer_public` and expand the shared secret into session keys.
pub(crate) fn agree_session_keys(
    private_key: EphemeralPrivateKey,
    peer_public: &[u8],
    salt: &[u8],
    info: &[u8],
) -> TrustResult<SessionKeys> {
    if peer_public.len() != PUBLIC_KEY_LEN {
        return Err(invalid_public("X25519 public value must be 32 bytes"));
    }

    let peer = UnparsedPublicKey::new(&X25519, peer_public);
    agreement::agree_ephemeral(private_key, &peer, |shared| {
        let mut okm = Zeroizing::new([0u8; 2 * KEY_LEN]);
        derive_key_material(salt, shared, info, &mut okm[..])?;
        SessionKeys::from_bytes(&okm[..])
    })
    .map_err(|_| invalid_public("X25519 agreement failed"))?
}

/// Concatenate two public values for use as HKDF salt.
pub(crate) fn transcript(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut salt = Vec::with_capacity(first.len() + second.len());
    salt.extend_from_slice(first);
    salt.extend_from_slice(second);
    salt
}
