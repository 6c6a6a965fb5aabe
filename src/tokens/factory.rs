//! Token issuance and renewal on the authority side.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::TokenConfig;
use crate::crypto::{random_serial_number, AuthorityKeys, SessionKeys};
use crate::error::{TrustError, TrustResult};

use super::clock::truncate_to_seconds;
use super::master::{MasterToken, MasterTokenData};
use super::sequence::SequenceSpace;
use super::service::{ServiceToken, ServiceTokenData};
use super::user_id::{UserIdToken, UserIdTokenData};

/// Issues master, user ID and service tokens under the authority keys.
#[derive(Clone)]
pub struct TokenFactory {
    authority: Arc<AuthorityKeys>,
    config: TokenConfig,
}

impl TokenFactory {
    pub fn new(authority: Arc<AuthorityKeys>, config: TokenConfig) -> Self {
        Self { authority, config }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn authority(&self) -> &AuthorityKeys {
        &self.authority
    }

    fn window(now: DateTime<Utc>, renewal: u64, expiration: u64) -> TrustResult<(DateTime<Utc>, DateTime<Utc>)> {
        let now = truncate_to_seconds(now);
        Ok((offset(now, renewal)?, offset(now, expiration)?))
    }

    /// Issue the first master token of a new trust context: sequence
    /// number 0 under a fresh serial number.
    pub fn create_master_token(
        &self,
        identity: &str,
        keys: &SessionKeys,
        now: DateTime<Utc>,
    ) -> TrustResult<MasterToken> {
        let (renewal_window, expiration) = Self::window(
            now,
            self.config.renewal_offset_seconds,
            self.config.expiration_offset_seconds,
        )?;
        let serial_number = random_serial_number()?;
        self.issue_master_token(identity, keys, renewal_window, expiration, 0, serial_number)
    }

    /// Issue the next generation of `previous`: same serial number, sequence
    /// number incremented by one, validity recomputed from `now`.
    pub fn renew_master_token(
        &self,
        previous: &MasterToken,
        keys: &SessionKeys,
        now: DateTime<Utc>,
    ) -> TrustResult<MasterToken> {
        let (renewal_window, expiration) = Self::window(
            now,
            self.config.renewal_offset_seconds,
            self.config.expiration_offset_seconds,
        )?;
        self.issue_master_token(
            previous.identity(),
            keys,
            renewal_window,
            expiration,
            SequenceSpace::increment(previous.sequence_number()),
            previous.serial_number(),
        )
    }

    /// Issue a master token with explicit fields.
    pub fn issue_master_token(
        &self,
        identity: &str,
        keys: &SessionKeys,
        renewal_window: DateTime<Utc>,
        expiration: DateTime<Utc>,
        sequence_number: u64,
        serial_number: u64,
    ) -> TrustResult<MasterToken> {
        let context = self.authority.context();
        let data = MasterTokenData {
            renewal_window: truncate_to_seconds(renewal_window),
            expiration: truncate_to_seconds(expiration),
            sequence_number,
            serial_number,
            identity: identity.to_string(),
            session_data: context.seal(&keys.to_bytes())?,
        };

        debug!(
            identity = %identity,
            sequence_number,
            serial_number,
            "Issuing master token"
        );
        MasterToken::sign(data, context)
    }

    /// Issue a user ID token bound to `master_token`.
    pub fn create_user_id_token(
        &self,
        user: &str,
        master_token: &MasterToken,
        now: DateTime<Utc>,
    ) -> TrustResult<UserIdToken> {
        let serial_number = random_serial_number()?;
        self.user_id_token(user, master_token, serial_number, now)
    }

    /// Reissue `previous` with fresh validity, bound to `master_token`.
    pub fn renew_user_id_token(
        &self,
        previous: &UserIdToken,
        master_token: &MasterToken,
        now: DateTime<Utc>,
    ) -> TrustResult<UserIdToken> {
        self.user_id_token(previous.user(), master_token, previous.serial_number(), now)
    }

    fn user_id_token(
        &self,
        user: &str,
        master_token: &MasterToken,
        serial_number: u64,
        now: DateTime<Utc>,
    ) -> TrustResult<UserIdToken> {
        let (renewal_window, expiration) = Self::window(
            now,
            self.config.user_id_token_renewal_offset_seconds,
            self.config.user_id_token_expiration_offset_seconds,
        )?;
        let data = UserIdTokenData {
            renewal_window,
            expiration,
            master_token_serial_number: master_token.serial_number(),
            serial_number,
            user: user.to_string(),
        };
        UserIdToken::sign(data, self.authority.context())
    }

    /// Issue a service token, optionally bound and optionally encrypted.
    pub fn create_service_token(
        &self,
        name: &str,
        data: &[u8],
        master_token: Option<&MasterToken>,
        user_id_token: Option<&UserIdToken>,
        encrypt: bool,
    ) -> TrustResult<ServiceToken> {
        let context = self.authority.context();
        let payload = if encrypt {
            context.encrypt(data)?
        } else {
            data.to_vec()
        };
        let data = ServiceTokenData {
            name: name.to_string(),
            master_token_serial_number: master_token.map(MasterToken::serial_number),
            user_id_token_serial_number: user_id_token.map(UserIdToken::serial_number),
            encrypted: encrypt,
            data: payload,
        };
        ServiceToken::sign(data, context)
    }
}

/// `now` plus `seconds`, or a config error when the result is unrepresentable.
fn offset(now: DateTime<Utc>, seconds: u64) -> TrustResult<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| TrustError::Config {
            message: format!("token validity offset of {} seconds is out of range", seconds),
        })
}
