//! User authenticator trait and the built-in user ID token authenticator.

use std::collections::HashMap;
use std::sync::Arc;

use ring::hmac;
use ring::rand::SystemRandom;
use tracing::{debug, warn};

use crate::crypto::AuthorityKeys;
use crate::error::{AuthErrorKind, CryptoErrorKind, TrustError, TrustResult};

use super::data::{UserAuthData, UserAuthScheme};

/// Verifies user credentials for one scheme on behalf of an already
/// identified entity.
pub trait UserAuthenticator: Send + Sync {
    fn scheme(&self) -> UserAuthScheme;

    /// Verify the claim and return the authenticated user identity.
    fn verify(&self, entity_identity: &str, data: &UserAuthData) -> TrustResult<String>;
}

fn rejected(user: &str, message: impl Into<String>) -> TrustError {
    TrustError::Auth {
        kind: AuthErrorKind::UserRejected {
            user: user.to_string(),
            message: message.into(),
        },
    }
}

/// Accepts a user ID token previously issued by this authority, presented
/// together with its master token.
///
/// The master token must belong to the entity sending the message and the
/// user ID token must be bound to it.
pub struct UserIdTokenAuthenticator {
    authority: Arc<AuthorityKeys>,
}

impl UserIdTokenAuthenticator {
    pub fn new(authority: Arc<AuthorityKeys>) -> Self {
        Self { authority }
    }
}

impl UserAuthenticator for UserIdTokenAuthenticator {
    fn scheme(&self) -> UserAuthScheme {
        UserAuthScheme::UserIdToken
    }

    fn verify(&self, entity_identity: &str, data: &UserAuthData) -> TrustResult<String> {
        let UserAuthData::UserIdToken {
            master_token,
            user_id_token,
        } = data
        else {
            return Err(rejected(data.identity(), "expected USER_ID_TOKEN data"));
        };

        let context = self.authority.context();
        let user = user_id_token.user();
        if master_token.verify(context).is_err() {
            return Err(rejected(user, "master token failed verification"));
        }
        if master_token.identity() != entity_identity {
            warn!(
                entity = %entity_identity,
                presented = %master_token.identity(),
                "User ID token presented under another entity's master token"
            );
            return Err(rejected(user, "master token belongs to another entity"));
        }
        if user_id_token.verify(context).is_err() {
            return Err(rejected(user, "user ID token failed verification"));
        }
        if !user_id_token.is_bound_to(master_token) {
            return Err(rejected(user, "user ID token not bound to master token"));
        }

        debug!(entity = %entity_identity, user = %user, "User authenticated by user ID token");
        Ok(user.to_string())
    }
}

/// Email/password authenticator over a fixed credential table.
///
/// Stands in for an external account service in embedded deployments and
/// tests. Passwords are held only as HMAC tags under a per-instance key.
pub struct StaticPasswordAuthenticator {
    key: hmac::Key,
    credentials: HashMap<String, hmac::Tag>,
}

impl StaticPasswordAuthenticator {
    pub fn new() -> TrustResult<Self> {
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &SystemRandom::new()).map_err(|_| {
            TrustError::Crypto {
                kind: CryptoErrorKind::RandomFailed,
            }
        })?;
        Ok(Self {
            key,
            credentials: HashMap::new(),
        })
    }

    pub fn with_user(mut self, email: impl Into<String>, password: &str) -> Self {
        let tag = hmac::sign(&self.key, password.as_bytes());
        self.credentials.insert(email.into(), tag);
        self
    }
}

impl UserAuthenticator for StaticPasswordAuthenticator {
    fn scheme(&self) -> UserAuthScheme {
        UserAuthScheme::EmailPassword
    }

    fn verify(&self, _entity_identity: &str, data: &UserAuthData) -> TrustResult<String> {
        let UserAuthData::EmailPassword { email, password } = data else {
            return Err(rejected(data.identity(), "expected EMAIL_PASSWORD data"));
        };

        let Some(tag) = self.credentials.get(email) else {
            return Err(rejected(email, "invalid email or password"));
        };
        hmac::verify(&self.key, password.as_bytes(), tag.as_ref())
            .map_err(|_| rejected(email, "invalid email or password"))?;
        Ok(email.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::crypto::SessionKeys;
    use crate::tokens::TokenFactory;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_user_id_token_authenticator() {
        let authority = Arc::new(AuthorityKeys::generate().unwrap());
        let factory = TokenFactory::new(authority.clone(), TokenConfig::default());
        let keys = SessionKeys::generate().unwrap();
        let master = factory.create_master_token("device-1", &keys, now()).unwrap();
        let other = factory.create_master_token("device-1", &keys, now()).unwrap();
        let uit = factory.create_user_id_token("alice", &master, now()).unwrap();

        let authenticator = UserIdTokenAuthenticator::new(authority);
        let good = UserAuthData::UserIdToken {
            master_token: master.clone(),
            user_id_token: uit.clone(),
        };
        assert_eq!(authenticator.verify("device-1", &good).unwrap(), "alice");

        // Wrong entity.
        assert!(authenticator.verify("device-2", &good).is_err());

        // Not bound.
        let unbound = UserAuthData::UserIdToken {
            master_token: other,
            user_id_token: uit,
        };
        let err = authenticator.verify("device-1", &unbound).unwrap_err();
        assert!(matches!(
            err,
            TrustError::Auth {
                kind: AuthErrorKind::UserRejected { .. }
            }
        ));
    }

    #[test]
    fn test_static_password_authenticator() {
        let authenticator = StaticPasswordAuthenticator::new()
            .unwrap()
            .with_user("alice@example.com", "s3cret");

        let good = UserAuthData::EmailPassword {
            email: "alice@example.com".to_string(),
            password: "s3cret".to_string(),
        };
        let bad = UserAuthData::EmailPassword {
            email: "alice@example.com".to_string(),
            password: "guess".to_string(),
        };
        assert_eq!(authenticator.verify("device-1", &good).unwrap(), "alice@example.com");
        assert!(authenticator.verify("device-1", &bad).is_err());
    }
}
