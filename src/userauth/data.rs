//! User authentication data variants.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tokens::{MasterToken, UserIdToken};

/// User authentication scheme tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAuthScheme {
    EmailPassword,
    /// A user ID token presented together with the master token it is bound to.
    UserIdToken,
}

impl UserAuthScheme {
    pub fn name(&self) -> &'static str {
        match self {
            UserAuthScheme::EmailPassword => "EMAIL_PASSWORD",
            UserAuthScheme::UserIdToken => "USER_ID_TOKEN",
        }
    }
}

impl fmt::Display for UserAuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User credential claim. Equality ignores credential fields.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "authdata", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAuthData {
    EmailPassword {
        email: String,
        password: String,
    },
    UserIdToken {
        master_token: MasterToken,
        user_id_token: UserIdToken,
    },
}

impl UserAuthData {
    pub fn scheme(&self) -> UserAuthScheme {
        match self {
            UserAuthData::EmailPassword { .. } => UserAuthScheme::EmailPassword,
            UserAuthData::UserIdToken { .. } => UserAuthScheme::UserIdToken,
        }
    }

    /// The claimed user identity.
    pub fn identity(&self) -> &str {
        match self {
            UserAuthData::EmailPassword { email, .. } => email,
            UserAuthData::UserIdToken { user_id_token, .. } => user_id_token.user(),
        }
    }

    /// The scheme's canonical attribute set.
    pub fn attributes(&self) -> BTreeMap<&'static str, String> {
        let mut attributes = BTreeMap::new();
        match self {
            UserAuthData::EmailPassword { email, password } => {
                attributes.insert("email", email.clone());
                attributes.insert("password", password.clone());
            }
            UserAuthData::UserIdToken {
                master_token,
                user_id_token,
            } => {
                attributes.insert("user", user_id_token.user().to_string());
                attributes.insert("master_token_identity", master_token.identity().to_string());
                attributes.insert(
                    "master_token_serial_number",
                    user_id_token.master_token_serial_number().to_string(),
                );
            }
        }
        attributes
    }
}

impl PartialEq for UserAuthData {
    fn eq(&self, other: &Self) -> bool {
        self.scheme() == other.scheme() && self.identity() == other.identity()
    }
}

impl Eq for UserAuthData {}

impl fmt::Debug for UserAuthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAuthData")
            .field("scheme", &self.scheme())
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_password() {
        let a = UserAuthData::EmailPassword {
            email: "alice@example.com".to_string(),
            password: "one".to_string(),
        };
        let b = UserAuthData::EmailPassword {
            email: "alice@example.com".to_string(),
            password: "two".to_string(),
        };
        assert_eq!(a, b);
        assert_eq!(a.identity(), "alice@example.com");
    }

    #[test]
    fn test_debug_hides_password() {
        let data = UserAuthData::EmailPassword {
            email: "alice@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", data).contains("hunter2"));
    }

    #[test]
    fn test_missing_password_rejected() {
        let json = r#"{"scheme":"EMAIL_PASSWORD","authdata":{"email":"a@b.c"}}"#;
        let err = serde_json::from_str::<UserAuthData>(json).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }
}
