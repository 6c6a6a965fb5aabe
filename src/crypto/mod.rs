//! Cryptographic primitives used by tokens and key exchange.
//!
//! Wraps ring's AES-256-GCM, HMAC-SHA256, HKDF and CSPRNG behind the
//! [`CryptoContext`] capability so the protocol logic never touches raw
//! cipher APIs.

mod authority;
mod context;
mod keys;
mod random;

pub use authority::{AuthorityKeys, MIN_SECRET_LEN};
pub use context::{CryptoContext, SessionCryptoContext, SIGNATURE_LEN};
pub use keys::{SessionKeys, KEY_LEN};
pub use random::{derive_key_material, fill_random, random_serial_number};
