//! Byte encoding of protocol values.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{EncodingErrorKind, TrustError, TrustResult};

/// Maximum encoded message size (1 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Encodes protocol values to bytes and back.
///
/// `decode` must reject missing mandatory fields and unknown scheme tags
/// with distinct [`EncodingErrorKind`]s.
pub trait Serializer: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> TrustResult<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> TrustResult<T>;
}

/// JSON encoding via `serde_json`.
#[derive(Debug, Clone, Copy)]
pub struct JsonSerializer {
    max_size: usize,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Text between the first pair of backticks in a serde message.
fn quoted(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(message[start..start + len].to_string())
}

fn classify(error: serde_json::Error) -> TrustError {
    let message = error.to_string();
    let kind = if message.starts_with("missing field") {
        EncodingErrorKind::MissingField {
            field: quoted(&message).unwrap_or_default(),
        }
    } else if message.starts_with("unknown variant") {
        EncodingErrorKind::UnsupportedScheme {
            scheme: quoted(&message).unwrap_or_default(),
        }
    } else {
        EncodingErrorKind::MalformedData { message }
    };
    TrustError::Encoding { kind }
}

impl Serializer for JsonSerializer {
    fn encode<T: Serialize>(&self, value: &T) -> TrustResult<Vec<u8>> {
        let bytes = serde_json::to_vec(value)?;
        if bytes.len() > self.max_size {
            return Err(TrustError::Encoding {
                kind: EncodingErrorKind::MalformedData {
                    message: format!("encoded size {} exceeds {}", bytes.len(), self.max_size),
                },
            });
        }
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> TrustResult<T> {
        // Sanity check message size
        if bytes.len() > self.max_size {
            return Err(TrustError::Encoding {
                kind: EncodingErrorKind::MalformedData {
                    message: format!("message size {} exceeds {}", bytes.len(), self.max_size),
                },
            });
        }
        serde_json::from_slice(bytes).map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entityauth::EntityAuthData;
    use crate::keyx::KeyRequestData;

    #[test]
    fn test_roundtrip() {
        let codec = JsonSerializer::new();
        let data = EntityAuthData::Psk {
            identity: "device-1".to_string(),
        };
        let bytes = codec.encode(&data).unwrap();
        let decoded: EntityAuthData = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_missing_field() {
        let codec = JsonSerializer::new();
        let err = codec
            .decode::<EntityAuthData>(br#"{"scheme":"X509","authdata":{"identity":"d"}}"#)
            .unwrap_err();
        match err {
            TrustError::Encoding {
                kind: EncodingErrorKind::MissingField { field },
            } => assert_eq!(field, "certificate"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_scheme() {
        let codec = JsonSerializer::new();
        let err = codec
            .decode::<KeyRequestData>(br#"{"scheme":"JWK_LADDER","keydata":{}}"#)
            .unwrap_err();
        match err {
            TrustError::Encoding {
                kind: EncodingErrorKind::UnsupportedScheme { scheme },
            } => assert_eq!(scheme, "JWK_LADDER"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_and_oversized() {
        let codec = JsonSerializer::with_max_size(16);
        assert!(matches!(
            codec.decode::<EntityAuthData>(b"{not json"),
            Err(TrustError::Encoding {
                kind: EncodingErrorKind::MalformedData { .. }
            })
        ));
        assert!(codec.decode::<EntityAuthData>(&[b' '; 17]).is_err());
    }
}
