//! Authority token-protection keys.

use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{CryptoErrorKind, TrustError, TrustResult};

use super::context::{CryptoContext, SessionCryptoContext};
use super::keys::{SessionKeys, KEY_LEN};
use super::random::derive_key_material;

/// Minimum accepted authority secret length.
pub const MIN_SECRET_LEN: usize = 32;

const AUTHORITY_KDF_SALT: &[u8] = b"trustline-authority-v1";
const AUTHORITY_KDF_INFO: &[u8] = b"token-protection";

/// The authority's own crypto context.
///
/// Signs every token the authority issues and encrypts the session keys
/// carried inside master tokens. Entities never hold these keys.
#[derive(Debug)]
pub struct AuthorityKeys {
    context: SessionCryptoContext,
}

impl AuthorityKeys {
    /// Derive the token-protection keys from a secret.
    pub fn from_secret(secret: &[u8]) -> TrustResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TrustError::Crypto {
                kind: CryptoErrorKind::SecretError {
                    message: format!(
                        "authority secret is {} bytes, at least {} required",
                        secret.len(),
                        MIN_SECRET_LEN
                    ),
                },
            });
        }

        let mut okm = Zeroizing::new([0u8; 2 * KEY_LEN]);
        derive_key_material(AUTHORITY_KDF_SALT, secret, AUTHORITY_KDF_INFO, &mut okm[..])?;
        let keys = SessionKeys::from_bytes(&okm[..])?;

        Ok(Self {
            context: SessionCryptoContext::new(&keys)?,
        })
    }

    /// Generate throwaway authority keys from a random secret.
    pub fn generate() -> TrustResult<Self> {
        let mut secret = Zeroizing::new([0u8; MIN_SECRET_LEN]);
        super::random::fill_random(&mut secret[..])?;
        Self::from_secret(&secret[..])
    }

    /// Load the authority secret from a file and derive keys from it.
    ///
    /// Security: Verifies the file has restrictive permissions (0600 or 0400)
    /// before loading to prevent secrets from being readable by other users.
    pub fn load(path: &Path) -> TrustResult<Self> {
        let secret = Self::load_secret(path)?;
        Self::from_secret(&secret)
    }

    fn load_secret(path: &Path) -> TrustResult<Zeroizing<Vec<u8>>> {
        // Check file permissions first
        let metadata = std::fs::metadata(path).map_err(|e| TrustError::Crypto {
            kind: CryptoErrorKind::SecretError {
                message: format!(
                    "Failed to read authority secret metadata from {}: {}",
                    path.display(),
                    e
                ),
            },
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            // Group and world bits must all be zero
            if mode & 0o077 != 0 {
                return Err(TrustError::Crypto {
                    kind: CryptoErrorKind::SecretError {
                        message: format!(
                            "Authority secret file {} has insecure permissions {:04o}, expected 0600 or 0400",
                            path.display(),
                            mode & 0o777
                        ),
                    },
                });
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        std::fs::read(path).map(Zeroizing::new).map_err(|e| TrustError::Crypto {
            kind: CryptoErrorKind::SecretError {
                message: format!(
                    "Failed to read authority secret from {}: {}",
                    path.display(),
                    e
                ),
            },
        })
    }

    /// The context used to sign and encrypt issued tokens.
    pub fn context(&self) -> &dyn CryptoContext {
        &self.context
    }
}
