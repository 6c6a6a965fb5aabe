//! User ID tokens: user identity bound to a master token serial number.

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoContext;
use crate::error::{TokenErrorKind, TrustError, TrustResult};
use crate::protocol::hex_bytes;

use super::master::MasterToken;
use super::sequence::SequenceSpace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdTokenData {
    #[serde(with = "ts_seconds")]
    pub renewal_window: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub expiration: DateTime<Utc>,
    /// Serial number of the master token this token is bound to.
    pub master_token_serial_number: u64,
    pub serial_number: u64,
    pub user: String,
}

impl UserIdTokenData {
    fn check(&self) -> TrustResult<()> {
        if self.user.is_empty() {
            return Err(TrustError::invalid_value("user", "must not be empty"));
        }
        if !SequenceSpace::is_valid(self.master_token_serial_number) {
            return Err(TrustError::invalid_value(
                "master_token_serial_number",
                "out of range",
            ));
        }
        if !SequenceSpace::is_valid(self.serial_number) {
            return Err(TrustError::invalid_value("serial_number", "out of range"));
        }
        if self.expiration <= self.renewal_window {
            return Err(TrustError::invalid_value(
                "expiration",
                "must be after the renewal window",
            ));
        }
        Ok(())
    }
}

/// A user identity vouched for by the authority.
///
/// Holds only the serial number of its master token, never the token
/// itself, so a superseded master token can be dropped freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignedUserIdToken")]
pub struct UserIdToken {
    data: UserIdTokenData,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

#[derive(Deserialize)]
struct SignedUserIdToken {
    data: UserIdTokenData,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

impl TryFrom<SignedUserIdToken> for UserIdToken {
    type Error = TrustError;

    fn try_from(raw: SignedUserIdToken) -> Result<Self, Self::Error> {
        raw.data.check()?;
        Ok(Self {
            data: raw.data,
            signature: raw.signature,
        })
    }
}

impl UserIdToken {
    pub(crate) fn sign(data: UserIdTokenData, authority: &dyn CryptoContext) -> TrustResult<Self> {
        data.check()?;
        let signature = authority.sign(&serde_json::to_vec(&data)?)?;
        Ok(Self { data, signature })
    }

    /// Check the authority signature.
    pub fn verify(&self, authority: &dyn CryptoContext) -> TrustResult<()> {
        if authority.verify(&serde_json::to_vec(&self.data)?, &self.signature) {
            Ok(())
        } else {
            Err(TrustError::token(TokenErrorKind::UserIdTokenUntrusted))
        }
    }

    pub fn is_bound_to(&self, master_token: &MasterToken) -> bool {
        self.data.master_token_serial_number == master_token.serial_number()
    }

    pub fn is_renewable(&self, now: DateTime<Utc>) -> bool {
        now >= self.data.renewal_window
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.data.expiration
    }

    pub fn user(&self) -> &str {
        &self.data.user
    }

    pub fn serial_number(&self) -> u64 {
        self.data.serial_number
    }

    pub fn master_token_serial_number(&self) -> u64 {
        self.data.master_token_serial_number
    }

    pub fn renewal_window(&self) -> DateTime<Utc> {
        self.data.renewal_window
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.data.expiration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AuthorityKeys;
    use chrono::Duration;

    fn data(master_token_serial_number: u64) -> UserIdTokenData {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        UserIdTokenData {
            renewal_window: now + Duration::seconds(10),
            expiration: now + Duration::seconds(20),
            master_token_serial_number,
            serial_number: 9,
            user: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn test_verify_and_tamper() {
        let authority = AuthorityKeys::generate().unwrap();
        let token = UserIdToken::sign(data(1), authority.context()).unwrap();
        assert!(token.verify(authority.context()).is_ok());

        let mut tampered = token.clone();
        tampered.data.user = "mallory@example.com".to_string();
        assert!(matches!(
            tampered.verify(authority.context()),
            Err(TrustError::Token {
                kind: TokenErrorKind::UserIdTokenUntrusted
            })
        ));
    }

    #[test]
    fn test_decode_rejects_missing_user() {
        let authority = AuthorityKeys::generate().unwrap();
        let token = UserIdToken::sign(data(1), authority.context()).unwrap();
        let mut value = serde_json::to_value(&token).unwrap();
        value["data"].as_object_mut().unwrap().remove("user");
        let err = serde_json::from_value::<UserIdToken>(value).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_time_status() {
        let authority = AuthorityKeys::generate().unwrap();
        let token = UserIdToken::sign(data(1), authority.context()).unwrap();
        assert!(!token.is_renewable(token.renewal_window() - Duration::seconds(1)));
        assert!(token.is_renewable(token.renewal_window()));
        assert!(token.is_expired(token.expiration()));
    }
}
