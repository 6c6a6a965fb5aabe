//! Service tokens: application data optionally bound to master/user tokens.

use serde::{Deserialize, Serialize};

use crate::crypto::CryptoContext;
use crate::error::{TokenErrorKind, TrustError, TrustResult};
use crate::protocol::hex_bytes;

use super::master::MasterToken;
use super::user_id::UserIdToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTokenData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_token_serial_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_token_serial_number: Option<u64>,
    pub encrypted: bool,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl ServiceTokenData {
    fn check(&self) -> TrustResult<()> {
        if self.name.is_empty() {
            return Err(TrustError::invalid_value("name", "must not be empty"));
        }
        if self.user_id_token_serial_number.is_some() && self.master_token_serial_number.is_none() {
            return Err(TrustError::invalid_value(
                "user_id_token_serial_number",
                "user-bound service tokens must also be bound to a master token",
            ));
        }
        Ok(())
    }
}

/// Named application data carried alongside the trust tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignedServiceToken")]
pub struct ServiceToken {
    data: ServiceTokenData,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

#[derive(Deserialize)]
struct SignedServiceToken {
    data: ServiceTokenData,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

impl TryFrom<SignedServiceToken> for ServiceToken {
    type Error = TrustError;

    fn try_from(raw: SignedServiceToken) -> Result<Self, Self::Error> {
        raw.data.check()?;
        Ok(Self {
            data: raw.data,
            signature: raw.signature,
        })
    }
}

impl ServiceToken {
    pub(crate) fn sign(data: ServiceTokenData, authority: &dyn CryptoContext) -> TrustResult<Self> {
        data.check()?;
        let signature = authority.sign(&serde_json::to_vec(&data)?)?;
        Ok(Self { data, signature })
    }

    pub fn verify(&self, authority: &dyn CryptoContext) -> TrustResult<()> {
        if authority.verify(&serde_json::to_vec(&self.data)?, &self.signature) {
            Ok(())
        } else {
            Err(TrustError::token(TokenErrorKind::ServiceTokenUntrusted {
                name: self.data.name.clone(),
            }))
        }
    }

    /// The application data, decrypted when the token is encrypted.
    pub fn data(&self, authority: &dyn CryptoContext) -> TrustResult<Vec<u8>> {
        if self.data.encrypted {
            authority.decrypt(&self.data.data)
        } else {
            Ok(self.data.data.clone())
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn is_encrypted(&self) -> bool {
        self.data.encrypted
    }

    pub fn is_unbound(&self) -> bool {
        self.data.master_token_serial_number.is_none()
            && self.data.user_id_token_serial_number.is_none()
    }

    pub fn is_master_token_bound(&self) -> bool {
        self.data.master_token_serial_number.is_some()
    }

    pub fn is_user_id_token_bound(&self) -> bool {
        self.data.user_id_token_serial_number.is_some()
    }

    pub fn is_bound_to_master_token(&self, master_token: &MasterToken) -> bool {
        self.data.master_token_serial_number == Some(master_token.serial_number())
    }

    pub fn is_bound_to_user_id_token(&self, user_id_token: &UserIdToken) -> bool {
        self.data.user_id_token_serial_number == Some(user_id_token.serial_number())
    }
}
