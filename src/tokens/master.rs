//! Master tokens: the authority-issued trust object for one entity.

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{CryptoContext, SessionKeys};
use crate::error::{TrustError, TrustResult};
use crate::protocol::hex_bytes;

use super::sequence::SequenceSpace;

/// The signed portion of a master token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterTokenData {
    #[serde(with = "ts_seconds")]
    pub renewal_window: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub expiration: DateTime<Utc>,
    pub sequence_number: u64,
    pub serial_number: u64,
    pub identity: String,
    /// Session keys sealed under the authority context.
    #[serde(with = "hex_bytes")]
    pub session_data: Vec<u8>,
}

impl MasterTokenData {
    fn check(&self) -> TrustResult<()> {
        if self.identity.is_empty() {
            return Err(TrustError::invalid_value("identity", "must not be empty"));
        }
        if !SequenceSpace::is_valid(self.sequence_number) {
            return Err(TrustError::invalid_value(
                "sequence_number",
                format!("{} out of range", self.sequence_number),
            ));
        }
        if !SequenceSpace::is_valid(self.serial_number) {
            return Err(TrustError::invalid_value(
                "serial_number",
                format!("{} out of range", self.serial_number),
            ));
        }
        if self.expiration <= self.renewal_window {
            return Err(TrustError::invalid_value(
                "expiration",
                "must be after the renewal window",
            ));
        }
        Ok(())
    }

    fn signing_bytes(&self) -> TrustResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Outcome of a successful [`MasterToken::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub renewable: bool,
    pub expired: bool,
}

/// Authority-issued trust object binding an entity identity to session keys.
///
/// Immutable: renewal produces a new instance. Invariant: `expiration` is
/// strictly after `renewal_window`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignedMasterToken")]
pub struct MasterToken {
    data: MasterTokenData,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

#[derive(Deserialize)]
struct SignedMasterToken {
    data: MasterTokenData,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

impl TryFrom<SignedMasterToken> for MasterToken {
    type Error = TrustError;

    fn try_from(raw: SignedMasterToken) -> Result<Self, Self::Error> {
        raw.data.check()?;
        Ok(Self {
            data: raw.data,
            signature: raw.signature,
        })
    }
}

impl MasterToken {
    /// Sign token data with the authority context.
    pub(crate) fn sign(data: MasterTokenData, authority: &dyn CryptoContext) -> TrustResult<Self> {
        data.check()?;
        let signature = authority.sign(&data.signing_bytes()?)?;
        Ok(Self { data, signature })
    }

    /// Check the signature and report the token's time status at `now`.
    ///
    /// Fails closed: an unverifiable signature is an integrity error.
    pub fn validate(&self, now: DateTime<Utc>, authority: &dyn CryptoContext) -> TrustResult<Validity> {
        self.verify(authority)?;
        Ok(Validity {
            renewable: self.is_renewable(now),
            expired: self.is_expired(now),
        })
    }

    /// Check the authority signature only.
    pub fn verify(&self, authority: &dyn CryptoContext) -> TrustResult<()> {
        if !authority.verify(&self.data.signing_bytes()?, &self.signature) {
            return Err(TrustError::integrity());
        }
        Ok(())
    }

    /// Unseal the session keys carried by this token.
    pub fn session_keys(&self, authority: &dyn CryptoContext) -> TrustResult<SessionKeys> {
        let plaintext = Zeroizing::new(authority.unseal(&self.data.session_data)?);
        SessionKeys::from_bytes(&plaintext)
    }

    pub fn is_renewable(&self, now: DateTime<Utc>) -> bool {
        now >= self.data.renewal_window
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.data.expiration
    }

    /// True iff this token's sequence number is ahead of `other`'s, or the
    /// sequence numbers match and this token expires later.
    pub fn is_newer_than(&self, other: &MasterToken) -> bool {
        if self.data.sequence_number == other.data.sequence_number {
            return self.data.expiration > other.data.expiration;
        }
        SequenceSpace::is_ahead(self.data.sequence_number, other.data.sequence_number)
    }

    pub fn identity(&self) -> &str {
        &self.data.identity
    }

    pub fn sequence_number(&self) -> u64 {
        self.data.sequence_number
    }

    pub fn serial_number(&self) -> u64 {
        self.data.serial_number
    }

    pub fn renewal_window(&self) -> DateTime<Utc> {
        self.data.renewal_window
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.data.expiration
    }

    pub fn data(&self) -> &MasterTokenData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AuthorityKeys;
    use chrono::Duration;

    fn token(
        authority: &AuthorityKeys,
        sequence_number: u64,
        renewal_window: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> MasterToken {
        let keys = SessionKeys::generate().unwrap();
        let data = MasterTokenData {
            renewal_window,
            expiration,
            sequence_number,
            serial_number: 77,
            identity: "device-1".to_string(),
            session_data: authority.context().seal(&keys.to_bytes()).unwrap(),
        };
        MasterToken::sign(data, authority.context()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_window_boundaries_inclusive() {
        let authority = AuthorityKeys::generate().unwrap();
        let t = token(&authority, 0, now(), now() + Duration::seconds(10));

        assert!(t.is_renewable(now()));
        assert!(!t.is_renewable(now() - Duration::seconds(1)));
        assert!(t.is_expired(now() + Duration::seconds(10)));
        assert!(!t.is_expired(now() + Duration::seconds(9)));
    }

    #[test]
    fn test_validate_reports_status() {
        let authority = AuthorityKeys::generate().unwrap();
        let t = token(
            &authority,
            0,
            now() - Duration::seconds(20),
            now() - Duration::seconds(10),
        );

        let validity = t.validate(now(), authority.context()).unwrap();
        assert!(validity.renewable);
        assert!(validity.expired);
    }

    #[test]
    fn test_validate_fails_closed_for_foreign_authority() {
        let authority = AuthorityKeys::generate().unwrap();
        let other = AuthorityKeys::generate().unwrap();
        let t = token(&authority, 0, now(), now() + Duration::seconds(10));

        assert!(matches!(
            t.validate(now(), other.context()),
            Err(TrustError::Crypto { .. })
        ));
        assert!(t.session_keys(other.context()).is_err());
    }

    #[test]
    fn test_tampered_sequence_number_detected() {
        let authority = AuthorityKeys::generate().unwrap();
        let mut t = token(&authority, 0, now(), now() + Duration::seconds(10));
        t.data.sequence_number = 5;
        assert!(t.validate(now(), authority.context()).is_err());
    }

    #[test]
    fn test_newer_by_sequence_then_expiration() {
        let authority = AuthorityKeys::generate().unwrap();
        let rw = now();
        let a = token(&authority, 1, rw, rw + Duration::seconds(10));
        let b = token(&authority, 2, rw, rw + Duration::seconds(5));
        assert!(b.is_newer_than(&a));
        assert!(!a.is_newer_than(&b));

        let c = token(&authority, 2, rw, rw + Duration::seconds(20));
        assert!(c.is_newer_than(&b));
        assert!(!b.is_newer_than(&c));
        assert!(!c.is_newer_than(&c));
    }

    #[test]
    fn test_newer_across_wraparound() {
        let authority = AuthorityKeys::generate().unwrap();
        let rw = now();
        let old = token(&authority, SequenceSpace::MAX, rw, rw + Duration::seconds(10));
        let new = token(&authority, 0, rw, rw + Duration::seconds(10));
        assert!(new.is_newer_than(&old));
        assert!(!old.is_newer_than(&new));
    }

    #[test]
    fn test_sign_rejects_inverted_window() {
        let authority = AuthorityKeys::generate().unwrap();
        let data = MasterTokenData {
            renewal_window: now(),
            expiration: now(),
            sequence_number: 0,
            serial_number: 1,
            identity: "device-1".to_string(),
            session_data: Vec::new(),
        };
        assert!(MasterToken::sign(data, authority.context()).is_err());
    }

    #[test]
    fn test_decode_enforces_invariants() {
        let authority = AuthorityKeys::generate().unwrap();
        let t = token(&authority, 3, now(), now() + Duration::seconds(10));

        let json = serde_json::to_string(&t).unwrap();
        let decoded: MasterToken = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, t);

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["data"]["sequence_number"] = serde_json::json!(SequenceSpace::MODULUS);
        assert!(serde_json::from_value::<MasterToken>(value).is_err());
    }

    #[test]
    fn test_session_keys_roundtrip_through_authority() {
        let authority = AuthorityKeys::generate().unwrap();
        let keys = SessionKeys::generate().unwrap();
        let data = MasterTokenData {
            renewal_window: now(),
            expiration: now() + Duration::seconds(10),
            sequence_number: 0,
            serial_number: 1,
            identity: "device-1".to_string(),
            session_data: authority.context().seal(&keys.to_bytes()).unwrap(),
        };
        let t = MasterToken::sign(data, authority.context()).unwrap();
        let unsealed = t.session_keys(authority.context()).unwrap();
        assert_eq!(unsealed.to_bytes().as_slice(), keys.to_bytes().as_slice());
    }
}
