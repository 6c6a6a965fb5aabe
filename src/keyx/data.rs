//! Key exchange request and response data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::hex_bytes;
use crate::tokens::MasterToken;

/// Key exchange scheme tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyExchangeScheme {
    SymmetricWrapped,
    AsymmetricWrapped,
    DiffieHellman,
}

impl KeyExchangeScheme {
    pub fn name(&self) -> &'static str {
        match self {
            KeyExchangeScheme::SymmetricWrapped => "SYMMETRIC_WRAPPED",
            KeyExchangeScheme::AsymmetricWrapped => "ASYMMETRIC_WRAPPED",
            KeyExchangeScheme::DiffieHellman => "DIFFIE_HELLMAN",
        }
    }
}

impl fmt::Display for KeyExchangeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which symmetric key wraps the new session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymmetricKeyId {
    /// The entity's pre-shared keys.
    Psk,
    /// The session keys of the presented master token.
    Session,
}

/// Initiator's key exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "keydata", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyRequestData {
    SymmetricWrapped {
        key_id: SymmetricKeyId,
    },
    AsymmetricWrapped {
        key_pair_id: String,
        /// X25519 public value.
        #[serde(with = "hex_bytes")]
        public_key: Vec<u8>,
    },
    DiffieHellman {
        parameters_id: String,
        /// X25519 public value.
        #[serde(with = "hex_bytes")]
        public_key: Vec<u8>,
    },
}

impl KeyRequestData {
    pub fn scheme(&self) -> KeyExchangeScheme {
        match self {
            KeyRequestData::SymmetricWrapped { .. } => KeyExchangeScheme::SymmetricWrapped,
            KeyRequestData::AsymmetricWrapped { .. } => KeyExchangeScheme::AsymmetricWrapped,
            KeyRequestData::DiffieHellman { .. } => KeyExchangeScheme::DiffieHellman,
        }
    }
}

/// Responder's key exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "keydata", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyResponseParams {
    SymmetricWrapped {
        key_id: SymmetricKeyId,
        #[serde(with = "hex_bytes")]
        wrapped_keys: Vec<u8>,
    },
    AsymmetricWrapped {
        key_pair_id: String,
        /// Authority's ephemeral X25519 public value.
        #[serde(with = "hex_bytes")]
        ephemeral_public_key: Vec<u8>,
        #[serde(with = "hex_bytes")]
        wrapped_keys: Vec<u8>,
    },
    DiffieHellman {
        parameters_id: String,
        #[serde(with = "hex_bytes")]
        public_key: Vec<u8>,
    },
}

impl KeyResponseParams {
    pub fn scheme(&self) -> KeyExchangeScheme {
        match self {
            KeyResponseParams::SymmetricWrapped { .. } => KeyExchangeScheme::SymmetricWrapped,
            KeyResponseParams::AsymmetricWrapped { .. } => KeyExchangeScheme::AsymmetricWrapped,
            KeyResponseParams::DiffieHellman { .. } => KeyExchangeScheme::DiffieHellman,
        }
    }
}

/// The issued master token plus the parameters the entity needs to recover
/// its session keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResponseData {
    pub master_token: MasterToken,
    pub params: KeyResponseParams,
}

impl KeyResponseData {
    pub fn scheme(&self) -> KeyExchangeScheme {
        self.params.scheme()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = KeyRequestData::DiffieHellman {
            parameters_id: "x25519".to_string(),
            public_key: vec![0xab; 32],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["scheme"], "DIFFIE_HELLMAN");
        assert_eq!(json["keydata"]["public_key"], "ab".repeat(32));

        let decoded: KeyRequestData = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.scheme(), KeyExchangeScheme::DiffieHellman);
    }

    #[test]
    fn test_symmetric_key_id_encoding() {
        let request = KeyRequestData::SymmetricWrapped {
            key_id: SymmetricKeyId::Session,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"SESSION\""));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let result = serde_json::from_str::<KeyRequestData>(r#"{"scheme":"JWE_LADDER","keydata":{}}"#);
        assert!(result.unwrap_err().to_string().contains("unknown variant"));
    }
}
