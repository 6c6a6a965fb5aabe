//! Entity authentication data variants.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrustError;
use crate::protocol::hex_bytes;

/// Entity authentication scheme tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityAuthScheme {
    /// Pre-shared keys.
    Psk,
    /// X.509 certificate.
    X509,
    /// RSA key pair registered with the authority.
    Rsa,
    /// Unauthenticated: the identity is taken at face value.
    None,
}

impl EntityAuthScheme {
    pub fn name(&self) -> &'static str {
        match self {
            EntityAuthScheme::Psk => "PSK",
            EntityAuthScheme::X509 => "X509",
            EntityAuthScheme::Rsa => "RSA",
            EntityAuthScheme::None => "NONE",
        }
    }
}

impl fmt::Display for EntityAuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Credential claim presented on first contact, before any master token
/// exists. Carries exactly the fields its scheme requires.
///
/// Equality is scheme plus identity. Decoding rejects empty fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "scheme",
    content = "authdata",
    rename_all = "SCREAMING_SNAKE_CASE",
    try_from = "RawEntityAuthData"
)]
pub enum EntityAuthData {
    Psk {
        identity: String,
    },
    X509 {
        /// Identity asserted by the certificate subject.
        identity: String,
        /// DER-encoded certificate.
        #[serde(with = "hex_bytes")]
        certificate: Vec<u8>,
    },
    Rsa {
        identity: String,
        /// Identifier of the registered RSA public key.
        public_key_id: String,
    },
    None {
        identity: String,
    },
}

#[derive(Deserialize)]
#[serde(tag = "scheme", content = "authdata", rename_all = "SCREAMING_SNAKE_CASE")]
enum RawEntityAuthData {
    Psk {
        identity: String,
    },
    X509 {
        identity: String,
        #[serde(with = "hex_bytes")]
        certificate: Vec<u8>,
    },
    Rsa {
        identity: String,
        public_key_id: String,
    },
    None {
        identity: String,
    },
}

fn required<T: AsRef<[u8]>>(field: &str, value: T) -> Result<T, TrustError> {
    if value.as_ref().is_empty() {
        return Err(TrustError::invalid_value(field, "must not be empty"));
    }
    Ok(value)
}

impl TryFrom<RawEntityAuthData> for EntityAuthData {
    type Error = TrustError;

    fn try_from(raw: RawEntityAuthData) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawEntityAuthData::Psk { identity } => EntityAuthData::Psk {
                identity: required("identity", identity)?,
            },
            RawEntityAuthData::X509 {
                identity,
                certificate,
            } => EntityAuthData::X509 {
                identity: required("identity", identity)?,
                certificate: required("certificate", certificate)?,
            },
            RawEntityAuthData::Rsa {
                identity,
                public_key_id,
            } => EntityAuthData::Rsa {
                identity: required("identity", identity)?,
                public_key_id: required("public_key_id", public_key_id)?,
            },
            RawEntityAuthData::None { identity } => EntityAuthData::None {
                identity: required("identity", identity)?,
            },
        })
    }
}

impl EntityAuthData {
    pub fn scheme(&self) -> EntityAuthScheme {
        match self {
            EntityAuthData::Psk { .. } => EntityAuthScheme::Psk,
            EntityAuthData::X509 { .. } => EntityAuthScheme::X509,
            EntityAuthData::Rsa { .. } => EntityAuthScheme::Rsa,
            EntityAuthData::None { .. } => EntityAuthScheme::None,
        }
    }

    /// The claimed entity identity.
    pub fn identity(&self) -> &str {
        match self {
            EntityAuthData::Psk { identity }
            | EntityAuthData::X509 { identity, .. }
            | EntityAuthData::Rsa { identity, .. }
            | EntityAuthData::None { identity } => identity,
        }
    }

    /// The scheme's canonical attribute set.
    pub fn attributes(&self) -> BTreeMap<&'static str, String> {
        let mut attributes = BTreeMap::new();
        match self {
            EntityAuthData::Psk { identity } | EntityAuthData::None { identity } => {
                attributes.insert("identity", identity.clone());
            }
            EntityAuthData::X509 {
                identity,
                certificate,
            } => {
                attributes.insert("identity", identity.clone());
                attributes.insert("certificate", hex::encode(certificate));
            }
            EntityAuthData::Rsa {
                identity,
                public_key_id,
            } => {
                attributes.insert("identity", identity.clone());
                attributes.insert("public_key_id", public_key_id.clone());
            }
        }
        attributes
    }
}

impl PartialEq for EntityAuthData {
    fn eq(&self, other: &Self) -> bool {
        self.scheme() == other.scheme() && self.identity() == other.identity()
    }
}

impl Eq for EntityAuthData {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_scheme() {
        let data = EntityAuthData::Rsa {
            identity: "device-7".to_string(),
            public_key_id: "rsa-key-1".to_string(),
        };
        assert_eq!(data.identity(), "device-7");
        assert_eq!(data.scheme(), EntityAuthScheme::Rsa);
        assert_eq!(data.attributes()["public_key_id"], "rsa-key-1");
    }

    #[test]
    fn test_equality_is_scheme_and_identity() {
        let a = EntityAuthData::X509 {
            identity: "device-7".to_string(),
            certificate: vec![1, 2, 3],
        };
        let b = EntityAuthData::X509 {
            identity: "device-7".to_string(),
            certificate: vec![4, 5, 6],
        };
        let c = EntityAuthData::Psk {
            identity: "device-7".to_string(),
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_wire_shape() {
        let data = EntityAuthData::None {
            identity: "anon".to_string(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["scheme"], "NONE");
        assert_eq!(json["authdata"]["identity"], "anon");
    }

    #[test]
    fn test_empty_fields_rejected() {
        for json in [
            r#"{"scheme":"NONE","authdata":{"identity":""}}"#,
            r#"{"scheme":"PSK","authdata":{"identity":""}}"#,
            r#"{"scheme":"RSA","authdata":{"identity":"device-7","public_key_id":""}}"#,
            r#"{"scheme":"X509","authdata":{"identity":"device-7","certificate":""}}"#,
        ] {
            let err = serde_json::from_str::<EntityAuthData>(json).unwrap_err();
            assert!(err.to_string().contains("must not be empty"), "{}: {}", json, err);
        }

        let data: EntityAuthData =
            serde_json::from_str(r#"{"scheme":"X509","authdata":{"identity":"device-7","certificate":"0a0b"}}"#)
                .unwrap();
        assert_eq!(data.identity(), "device-7");
    }

    #[test]
    fn test_missing_field_rejected() {
        let result =
            serde_json::from_str::<EntityAuthData>(r#"{"scheme":"RSA","authdata":{"identity":"x"}}"#);
        assert!(result.unwrap_err().to_string().contains("missing field"));
    }
}
