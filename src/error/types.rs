//! Error types for trust establishment and renewal.

use thiserror::Error;

use crate::protocol::ResponseCode;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum TrustError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed or incomplete encoded values.
    #[error("Encoding error: {kind}")]
    Encoding { kind: EncodingErrorKind },

    /// Cryptographic failures, including integrity check failures.
    #[error("Crypto error: {kind}")]
    Crypto { kind: CryptoErrorKind },

    /// Entity or user authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Token lifecycle errors (expiry, sequence drift, replay, binding).
    #[error("Token error: {kind}")]
    Token { kind: TokenErrorKind },

    /// Key exchange errors.
    #[error("Key exchange error: {kind}")]
    KeyExchange { kind: KeyExchangeErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors while encoding outbound values.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encoding error kinds.
#[derive(Error, Debug)]
pub enum EncodingErrorKind {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Malformed data: {message}")]
    MalformedData { message: String },

    #[error("Unsupported scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Message carries neither entity authentication data nor a master token")]
    MissingEntityCredentials,
}

/// Crypto error kinds.
#[derive(Error, Debug)]
pub enum CryptoErrorKind {
    #[error("Integrity check failed")]
    IntegrityCheckFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Random number generation failed")]
    RandomFailed,

    #[error("Invalid key material: {message}")]
    InvalidKeyMaterial { message: String },

    #[error("Failed to load authority secret: {message}")]
    SecretError { message: String },
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Entity '{identity}' rejected: {message}")]
    EntityRejected { identity: String, message: String },

    #[error("User '{user}' rejected: {message}")]
    UserRejected { user: String, message: String },

    #[error("Entity authentication scheme not supported: {scheme}")]
    EntitySchemeNotSupported { scheme: String },

    #[error("User authentication scheme not supported: {scheme}")]
    UserSchemeNotSupported { scheme: String },

    #[error("Entity mismatch: expected '{expected}', found '{actual}'")]
    EntityMismatch { expected: String, actual: String },
}

/// Token error kinds.
#[derive(Error, Debug)]
pub enum TokenErrorKind {
    #[error("Master token for '{identity}' expired")]
    MasterTokenExpired { identity: String },

    #[error(
        "Sequence number {presented} for '{identity}' out of sync with newest {newest}"
    )]
    SequenceOutOfSync {
        identity: String,
        presented: u64,
        newest: u64,
    },

    #[error("Master token for '{identity}' belongs to a superseded trust context")]
    SerialNumberMismatch { identity: String },

    #[error("Message {message_id} under sequence number {sequence_number} already seen")]
    Replayed {
        message_id: String,
        sequence_number: u64,
    },

    #[error(
        "Renewal from sequence number {presented} for '{identity}' superseded by {newest}"
    )]
    RenewalConflict {
        identity: String,
        presented: u64,
        newest: u64,
    },

    #[error("Master token for '{identity}' is not newer than the stored token")]
    NotNewer { identity: String },

    #[error("User ID token is not bound to the master token")]
    UserIdTokenNotBound,

    #[error("User ID token expired")]
    UserIdTokenExpired,

    #[error("User ID token failed verification")]
    UserIdTokenUntrusted,

    #[error("Service token '{name}' failed verification")]
    ServiceTokenUntrusted { name: String },
}

/// Key exchange error kinds.
#[derive(Error, Debug)]
pub enum KeyExchangeErrorKind {
    #[error("Key exchange scheme not supported: {scheme}")]
    SchemeNotSupported { scheme: String },

    #[error("Key exchange required to renew trust")]
    KeyExchangeRequired,

    #[error("Key exchange scheme mismatch: expected {expected}, found {actual}")]
    SchemeMismatch { expected: String, actual: String },

    #[error("No pre-shared keys for entity '{identity}'")]
    MissingPresharedKeys { identity: String },

    #[error("No session crypto context available for session-wrapped exchange")]
    MissingSessionContext,

    #[error("No local key material for the key response")]
    MissingLocalKeyMaterial,

    #[error("Invalid public value: {message}")]
    InvalidPublicValue { message: String },

    #[error("Key response identity '{actual}' does not match '{expected}'")]
    IdentityMismatch { expected: String, actual: String },
}

impl TrustError {
    /// Map this error to the response code surfaced at the message boundary.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            TrustError::Token { kind } => match kind {
                TokenErrorKind::MasterTokenExpired { .. } => ResponseCode::Expired,
                TokenErrorKind::SequenceOutOfSync { .. }
                | TokenErrorKind::SerialNumberMismatch { .. } => ResponseCode::EntityReauth,
                TokenErrorKind::Replayed { .. } => ResponseCode::Replayed,
                TokenErrorKind::RenewalConflict { .. } | TokenErrorKind::NotNewer { .. } => {
                    ResponseCode::TransientFailure
                }
                TokenErrorKind::UserIdTokenNotBound
                | TokenErrorKind::UserIdTokenExpired
                | TokenErrorKind::UserIdTokenUntrusted => ResponseCode::UserReauth,
                TokenErrorKind::ServiceTokenUntrusted { .. } => ResponseCode::Fail,
            },
            TrustError::Auth {
                kind: AuthErrorKind::UserRejected { .. },
            } => ResponseCode::UserReauth,
            TrustError::KeyExchange {
                kind: KeyExchangeErrorKind::KeyExchangeRequired,
            } => ResponseCode::KeyxRequired,
            _ => ResponseCode::Fail,
        }
    }

    pub(crate) fn integrity() -> Self {
        TrustError::Crypto {
            kind: CryptoErrorKind::IntegrityCheckFailed,
        }
    }

    pub(crate) fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        TrustError::Encoding {
            kind: EncodingErrorKind::InvalidValue {
                field: field.to_string(),
                message: message.into(),
            },
        }
    }

    pub(crate) fn token(kind: TokenErrorKind) -> Self {
        TrustError::Token { kind }
    }

    pub(crate) fn key_exchange(kind: KeyExchangeErrorKind) -> Self {
        TrustError::KeyExchange { kind }
    }
}

/// Result type alias for trust operations.
pub type TrustResult<T> = Result<T, TrustError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_map_to_codes() {
        let expired = TrustError::token(TokenErrorKind::MasterTokenExpired {
            identity: "device".to_string(),
        });
        assert_eq!(expired.response_code(), ResponseCode::Expired);

        let drift = TrustError::token(TokenErrorKind::SequenceOutOfSync {
            identity: "device".to_string(),
            presented: 33,
            newest: 0,
        });
        assert_eq!(drift.response_code(), ResponseCode::EntityReauth);

        let replay = TrustError::token(TokenErrorKind::Replayed {
            message_id: "m".to_string(),
            sequence_number: 0,
        });
        assert_eq!(replay.response_code(), ResponseCode::Replayed);

        let user = TrustError::token(TokenErrorKind::UserIdTokenNotBound);
        assert_eq!(user.response_code(), ResponseCode::UserReauth);
    }

    #[test]
    fn test_integrity_and_encoding_fail() {
        assert_eq!(TrustError::integrity().response_code(), ResponseCode::Fail);
        assert_eq!(
            TrustError::invalid_value("expiration", "before renewal window").response_code(),
            ResponseCode::Fail
        );
    }

    #[test]
    fn test_keyx_required_code() {
        let err = TrustError::key_exchange(KeyExchangeErrorKind::KeyExchangeRequired);
        assert_eq!(err.response_code(), ResponseCode::KeyxRequired);
    }

    #[test]
    fn test_error_display() {
        let err = TrustError::token(TokenErrorKind::RenewalConflict {
            identity: "device".to_string(),
            presented: 4,
            newest: 5,
        });
        assert!(err.to_string().contains("superseded by 5"));
    }
}
