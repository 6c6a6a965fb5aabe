//! Session key material.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoErrorKind, TrustError, TrustResult};

use super::random::fill_random;

/// Length of each session key in bytes.
pub const KEY_LEN: usize = 32;

/// Encryption and HMAC keys bound to one master token generation.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    encryption_key: [u8; KEY_LEN],
    hmac_key: [u8; KEY_LEN],
}

impl SessionKeys {
    pub fn new(encryption_key: [u8; KEY_LEN], hmac_key: [u8; KEY_LEN]) -> Self {
        Self {
            encryption_key,
            hmac_key,
        }
    }

    /// Generate fresh random session keys.
    pub fn generate() -> TrustResult<Self> {
        let mut keys = Self::new([0u8; KEY_LEN], [0u8; KEY_LEN]);
        fill_random(&mut keys.encryption_key)?;
        fill_random(&mut keys.hmac_key)?;
        Ok(keys)
    }

    /// Rebuild keys from their concatenated form (encryption key first).
    pub fn from_bytes(bytes: &[u8]) -> TrustResult<Self> {
        if bytes.len() != 2 * KEY_LEN {
            return Err(TrustError::Crypto {
                kind: CryptoErrorKind::InvalidKeyMaterial {
                    message: format!(
                        "expected {} bytes of session key material, got {}",
                        2 * KEY_LEN,
                        bytes.len()
                    ),
                },
            });
        }

        let mut keys = Self::new([0u8; KEY_LEN], [0u8; KEY_LEN]);
        keys.encryption_key.copy_from_slice(&bytes[..KEY_LEN]);
        keys.hmac_key.copy_from_slice(&bytes[KEY_LEN..]);
        Ok(keys)
    }

    /// Concatenated key bytes, zeroized when dropped.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(2 * KEY_LEN));
        bytes.extend_from_slice(&self.encryption_key);
        bytes.extend_from_slice(&self.hmac_key);
        bytes
    }

    pub fn encryption_key(&self) -> &[u8; KEY_LEN] {
        &self.encryption_key
    }

    pub fn hmac_key(&self) -> &[u8; KEY_LEN] {
        &self.hmac_key
    }
}

impl Clone for SessionKeys {
    fn clone(&self) -> Self {
        Self::new(self.encryption_key, self.hmac_key)
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys(..)")
    }
}
