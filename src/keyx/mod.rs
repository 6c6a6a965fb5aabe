//! Key exchange.
//!
//! Each scheme turns a [`KeyRequestData`] into fresh session keys plus the
//! [`KeyResponseParams`] the entity needs to recover them. Schemes are
//! looked up by tag in a [`KeyExchangeRegistry`].

mod asymmetric;
mod data;
mod diffie_hellman;
mod ecdh;
mod factory;
mod registry;
mod symmetric;

pub use asymmetric::AsymmetricWrappedFactory;
pub use data::{KeyExchangeScheme, KeyRequestData, KeyResponseData, KeyResponseParams, SymmetricKeyId};
pub use diffie_hellman::{DiffieHellmanFactory, X25519_PARAMETERS_ID};
pub use ecdh::PUBLIC_KEY_LEN;
pub use factory::{
    initiate, KeyExchangeChoice, KeyExchangeFactory, LocalKeyMaterial, PresharedKeyStore, WrapContext,
};
pub use registry::KeyExchangeRegistry;
pub use symmetric::SymmetricWrappedFactory;
