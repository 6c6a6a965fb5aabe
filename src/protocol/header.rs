//! Message headers: the protocol fields an entity sends with each message.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::CryptoContext;
use crate::entityauth::EntityAuthData;
use crate::error::{EncodingErrorKind, TrustError, TrustResult};
use crate::keyx::KeyRequestData;
use crate::tokens::{MasterToken, ServiceToken, UserIdToken};
use crate::userauth::UserAuthData;

use super::hex_bytes;

/// Header fields covered by the header signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderData {
    /// Message nonce.
    pub message_id: Uuid,

    /// First-contact credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_auth_data: Option<EntityAuthData>,

    /// Established trust; takes precedence over entity auth data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_token: Option<MasterToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_auth_data: Option<UserAuthData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_token: Option<UserIdToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_request_data: Option<KeyRequestData>,

    /// The entity asks for renewal of whatever is renewable.
    #[serde(default)]
    pub renewable: bool,

    #[serde(default)]
    pub non_replayable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_tokens: Vec<ServiceToken>,
}

impl HeaderData {
    /// Fresh header data for `credentials` with a random message id.
    pub fn new(credentials: EntityCredentials<'_>) -> Self {
        let (entity_auth_data, master_token) = match credentials {
            EntityCredentials::MasterToken(token) => (None, Some(token.clone())),
            EntityCredentials::EntityAuth(data) => (Some(data.clone()), None),
        };
        Self {
            message_id: Uuid::new_v4(),
            entity_auth_data,
            master_token,
            user_auth_data: None,
            user_id_token: None,
            key_request_data: None,
            renewable: false,
            non_replayable: false,
            service_tokens: Vec::new(),
        }
    }

    /// The credentials identifying the sender.
    pub fn entity_credentials(&self) -> TrustResult<EntityCredentials<'_>> {
        match (&self.master_token, &self.entity_auth_data) {
            (Some(token), _) => Ok(EntityCredentials::MasterToken(token)),
            (None, Some(data)) => Ok(EntityCredentials::EntityAuth(data)),
            (None, None) => Err(TrustError::Encoding {
                kind: EncodingErrorKind::MissingEntityCredentials,
            }),
        }
    }

    fn signing_bytes(&self) -> TrustResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// How the sender identifies itself.
#[derive(Debug, Clone, Copy)]
pub enum EntityCredentials<'a> {
    MasterToken(&'a MasterToken),
    EntityAuth(&'a EntityAuthData),
}

/// Header data plus an optional signature.
///
/// Headers that carry a master token must be signed with that token's
/// session crypto context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    data: HeaderData,
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    signature: Vec<u8>,
}

impl MessageHeader {
    pub fn signed(data: HeaderData, context: &dyn CryptoContext) -> TrustResult<Self> {
        let signature = context.sign(&data.signing_bytes()?)?;
        Ok(Self { data, signature })
    }

    pub fn unsigned(data: HeaderData) -> Self {
        Self {
            data,
            signature: Vec::new(),
        }
    }

    /// Check the header signature against `context`.
    pub fn verify(&self, context: &dyn CryptoContext) -> TrustResult<()> {
        if self.signature.is_empty() || !context.verify(&self.data.signing_bytes()?, &self.signature) {
            return Err(TrustError::integrity());
        }
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    pub fn data(&self) -> &HeaderData {
        &self.data
    }

    pub fn message_id(&self) -> Uuid {
        self.data.message_id
    }
}
