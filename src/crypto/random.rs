//! Secure randomness and key derivation helpers.

use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{CryptoErrorKind, TrustError, TrustResult};
use crate::tokens::SequenceSpace;

/// Fill `buf` from the system CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> TrustResult<()> {
    SystemRandom::new().fill(buf).map_err(|_| TrustError::Crypto {
        kind: CryptoErrorKind::RandomFailed,
    })
}

/// Random serial number in `[0, 2^53)`.
pub fn random_serial_number() -> TrustResult<u64> {
    let mut bytes = [0u8; 8];
    fill_random(&mut bytes)?;
    Ok(u64::from_be_bytes(bytes) & (SequenceSpace::MODULUS - 1))
}

struct OutputLen(usize);

impl hkdf::KeyType for OutputLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// HKDF-SHA256 extract-and-expand into `out`.
pub fn derive_key_material(salt: &[u8], ikm: &[u8], info: &[u8], out: &mut [u8]) -> TrustResult<()> {
    let kdf_error = |_| TrustError::Crypto {
        kind: CryptoErrorKind::KeyDerivationFailed,
    };

    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(ikm);
    let info = [info];
    let okm = prk.expand(&info, OutputLen(out.len())).map_err(kdf_error)?;
    okm.fill(out).map_err(kdf_error)
}
