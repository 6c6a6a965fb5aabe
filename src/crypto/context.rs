//! Crypto contexts: encrypt/decrypt and sign/verify bound to one key set.

use std::fmt;

use ring::{aead, hmac};

use crate::error::{CryptoErrorKind, TrustError, TrustResult};

use super::keys::SessionKeys;
use super::random::fill_random;

/// HMAC-SHA256 tag length.
pub const SIGNATURE_LEN: usize = 32;

/// Symmetric crypto operations bound to one set of keys.
///
/// `seal`/`unseal` compose encryption and signing (encrypt-then-MAC). Any
/// failed tag check surfaces as [`CryptoErrorKind::IntegrityCheckFailed`].
pub trait CryptoContext: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> TrustResult<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8]) -> TrustResult<Vec<u8>>;

    fn sign(&self, data: &[u8]) -> TrustResult<Vec<u8>>;

    fn verify(&self, data: &[u8], signature: &[u8]) -> bool;

    /// Encrypt then append an HMAC over the ciphertext.
    fn seal(&self, plaintext: &[u8]) -> TrustResult<Vec<u8>> {
        let mut sealed = self.encrypt(plaintext)?;
        let tag = self.sign(&sealed)?;
        sealed.extend_from_slice(&tag);
        Ok(sealed)
    }

    /// Check the trailing HMAC, then decrypt.
    fn unseal(&self, sealed: &[u8]) -> TrustResult<Vec<u8>> {
        if sealed.len() < SIGNATURE_LEN {
            return Err(TrustError::integrity());
        }
        let (ciphertext, tag) = sealed.split_at(sealed.len() - SIGNATURE_LEN);
        if !self.verify(ciphertext, tag) {
            return Err(TrustError::integrity());
        }
        self.decrypt(ciphertext)
    }
}

/// AES-256-GCM + HMAC-SHA256 context derived from [`SessionKeys`].
///
/// Ciphertext layout: `nonce (12) || ciphertext || gcm tag (16)`.
pub struct SessionCryptoContext {
    encryption_key: aead::LessSafeKey,
    hmac_key: hmac::Key,
}

impl SessionCryptoContext {
    pub fn new(keys: &SessionKeys) -> TrustResult<Self> {
        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, keys.encryption_key())
            .map_err(|_| TrustError::Crypto {
                kind: CryptoErrorKind::InvalidKeyMaterial {
                    message: "AES-256-GCM key rejected".to_string(),
                },
            })?;

        Ok(Self {
            encryption_key: aead::LessSafeKey::new(unbound),
            hmac_key: hmac::Key::new(hmac::HMAC_SHA256, keys.hmac_key()),
        })
    }
}

impl CryptoContext for SessionCryptoContext {
    fn encrypt(&self, plaintext: &[u8]) -> TrustResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; aead::NONCE_LEN];
        fill_random(&mut nonce_bytes)?;

        let mut in_out = plaintext.to_vec();
        self.encryption_key
            .seal_in_place_append_tag(
                aead::Nonce::assume_unique_for_key(nonce_bytes),
                aead::Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| TrustError::Crypto {
                kind: CryptoErrorKind::EncryptionFailed,
            })?;

        let mut ciphertext = Vec::with_capacity(aead::NONCE_LEN + in_out.len());
        ciphertext.extend_from_slice(&nonce_bytes);
        ciphertext.extend_from_slice(&in_out);
        Ok(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> TrustResult<Vec<u8>> {
        let tag_len = aead::AES_256_GCM.tag_len();
        if ciphertext.len() < aead::NONCE_LEN + tag_len {
            return Err(TrustError::integrity());
        }

        let (nonce_bytes, body) = ciphertext.split_at(aead::NONCE_LEN);
        let nonce =
            aead::Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| TrustError::integrity())?;

        let mut in_out = body.to_vec();
        let plaintext = self
            .encryption_key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| TrustError::integrity())?;
        Ok(plaintext.to_vec())
    }

    fn sign(&self, data: &[u8]) -> TrustResult<Vec<u8>> {
        Ok(hmac::sign(&self.hmac_key, data).as_ref().to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        hmac::verify(&self.hmac_key, data, signature).is_ok()
    }
}

impl fmt::Debug for SessionCryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCryptoContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionCryptoContext {
        SessionCryptoContext::new(&SessionKeys::generate().unwrap()).unwrap()
    }

    #[test]
    fn test_seal_unseal() {
        let ctx = context();
        let sealed = ctx.seal(b"session payload").unwrap();
        assert_ne!(&sealed[..], b"session payload");
        assert_eq!(ctx.unseal(&sealed).unwrap(), b"session payload");
    }

    #[test]
    fn test_encryption_is_randomized() {
        let ctx = context();
        assert_ne!(ctx.encrypt(b"same").unwrap(), ctx.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_tampered_ciphertext_fails_integrity() {
        let ctx = context();
        let mut sealed = ctx.seal(b"payload").unwrap();
        sealed[aead::NONCE_LEN] ^= 0x01;
        assert!(matches!(
            ctx.unseal(&sealed),
            Err(TrustError::Crypto {
                kind: CryptoErrorKind::IntegrityCheckFailed
            })
        ));
    }

    #[test]
    fn test_wrong_key_fails_integrity() {
        let sealed = context().seal(b"payload").unwrap();
        assert!(matches!(
            context().unseal(&sealed),
            Err(TrustError::Crypto {
                kind: CryptoErrorKind::IntegrityCheckFailed
            })
        ));
    }

    #[test]
    fn test_truncated_input_fails_integrity() {
        let ctx = context();
        assert!(ctx.unseal(&[0u8; 8]).is_err());
        assert!(ctx.decrypt(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_sign_verify() {
        let ctx = context();
        let signature = ctx.sign(b"header").unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(ctx.verify(b"header", &signature));
        assert!(!ctx.verify(b"headers", &signature));
    }
}
