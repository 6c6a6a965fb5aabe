//! Entity side of the protocol: build request headers, absorb responses.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::crypto::{CryptoContext, SessionCryptoContext, SessionKeys};
use crate::entityauth::EntityAuthData;
use crate::error::{KeyExchangeErrorKind, TrustError, TrustResult};
use crate::keyx::{initiate, KeyExchangeChoice, KeyExchangeRegistry, KeyExchangeScheme, LocalKeyMaterial, SymmetricKeyId};
use crate::protocol::{EntityCredentials, HeaderData, MessageHeader, MessageResponse, ResponseCode, Serializer};
use crate::store::TrustStore;
use crate::tokens::{ServiceToken, UserIdToken};
use crate::userauth::UserAuthData;

/// Key exchange an entity can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExchangeRequest {
    /// Keys wrapped under the entity's pre-shared keys.
    Psk,
    /// Keys wrapped under the live master token's session keys.
    Session,
    AsymmetricWrapped { key_pair_id: String },
    DiffieHellman,
}

/// What to put in the next header besides the entity credentials.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub renewable: bool,
    pub non_replayable: bool,
    pub key_exchange: Option<KeyExchangeRequest>,
    pub user_auth_data: Option<UserAuthData>,
    pub user_id_token: Option<UserIdToken>,
    pub service_tokens: Vec<ServiceToken>,
}

impl RequestOptions {
    /// Options for a renewable message carrying a key request.
    pub fn renew(key_exchange: KeyExchangeRequest) -> Self {
        Self {
            renewable: true,
            key_exchange: Some(key_exchange),
            ..Self::default()
        }
    }
}

/// Local key material for a request in flight.
#[derive(Debug)]
pub struct PendingExchange {
    local: LocalKeyMaterial,
}

impl PendingExchange {
    pub fn scheme(&self) -> KeyExchangeScheme {
        self.local.scheme()
    }
}

/// One entity's view of its trust context.
///
/// The entity keeps its own [`TrustStore`] holding the master token and
/// crypto context it received last. Headers are built from the store;
/// responses carrying key response data install the next generation.
pub struct EntitySession {
    identity: String,
    entity_auth_data: EntityAuthData,
    store: Arc<TrustStore>,
    key_exchange: KeyExchangeRegistry,
    preshared: Option<Arc<dyn CryptoContext>>,
}

impl EntitySession {
    pub fn new(entity_auth_data: EntityAuthData, store: Arc<TrustStore>) -> Self {
        Self {
            identity: entity_auth_data.identity().to_string(),
            entity_auth_data,
            store,
            key_exchange: KeyExchangeRegistry::with_defaults(Arc::new(HashMap::<String, SessionKeys>::new())),
            preshared: None,
        }
    }

    /// Use the entity's pre-shared keys for [`KeyExchangeRequest::Psk`].
    pub fn with_preshared_keys(mut self, keys: &SessionKeys) -> TrustResult<Self> {
        self.preshared = Some(Arc::new(SessionCryptoContext::new(keys)?));
        Ok(self)
    }

    pub fn with_key_exchange_registry(mut self, registry: KeyExchangeRegistry) -> Self {
        self.key_exchange = registry;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    /// Whether a master token is currently held.
    pub fn is_trusted(&self) -> bool {
        self.store.get(&self.identity).is_some()
    }

    /// Build the next header.
    ///
    /// Uses the stored master token when there is one, signing the header
    /// with its crypto context; otherwise falls back to the entity auth
    /// data and sends the header unsigned.
    pub fn build_request(&self, options: RequestOptions) -> TrustResult<(MessageHeader, Option<PendingExchange>)> {
        let entry = self.store.get(&self.identity);
        let credentials = match &entry {
            Some(entry) => EntityCredentials::MasterToken(entry.master_token()),
            None => EntityCredentials::EntityAuth(&self.entity_auth_data),
        };

        let mut data = HeaderData::new(credentials);
        data.renewable = options.renewable;
        data.non_replayable = options.non_replayable;
        data.user_auth_data = options.user_auth_data;
        data.user_id_token = options.user_id_token;
        data.service_tokens = options.service_tokens;

        let pending = match options.key_exchange {
            Some(request) => {
                let choice = self.choice(request, entry.as_ref().map(|e| e.crypto_context()))?;
                let (key_request_data, local) = initiate(choice)?;
                data.key_request_data = Some(key_request_data);
                Some(PendingExchange { local })
            }
            None => None,
        };

        let header = match &entry {
            Some(entry) => MessageHeader::signed(data, entry.crypto_context().as_ref())?,
            None => MessageHeader::unsigned(data),
        };
        debug!(
            identity = %self.identity,
            message_id = %header.message_id(),
            trusted = entry.is_some(),
            "Built request"
        );
        Ok((header, pending))
    }

    fn choice(
        &self,
        request: KeyExchangeRequest,
        session: Option<Arc<dyn CryptoContext>>,
    ) -> TrustResult<KeyExchangeChoice> {
        Ok(match request {
            KeyExchangeRequest::Psk => KeyExchangeChoice::SymmetricWrapped {
                key_id: SymmetricKeyId::Psk,
                context: self.preshared.clone().ok_or_else(|| {
                    TrustError::key_exchange(KeyExchangeErrorKind::MissingPresharedKeys {
                        identity: self.identity.clone(),
                    })
                })?,
            },
            KeyExchangeRequest::Session => KeyExchangeChoice::SymmetricWrapped {
                key_id: SymmetricKeyId::Session,
                context: session
                    .ok_or_else(|| TrustError::key_exchange(KeyExchangeErrorKind::MissingSessionContext))?,
            },
            KeyExchangeRequest::AsymmetricWrapped { key_pair_id } => {
                KeyExchangeChoice::AsymmetricWrapped { key_pair_id }
            }
            KeyExchangeRequest::DiffieHellman => KeyExchangeChoice::DiffieHellman,
        })
    }

    /// Apply a response to the local trust context.
    ///
    /// Key response data installs the new master token and its session
    /// keys. `ENTITY_REAUTH` drops the local trust context so the next
    /// request falls back to entity authentication. Anything else leaves
    /// the store alone.
    pub fn absorb_response(&self, response: &MessageResponse, pending: Option<PendingExchange>) -> TrustResult<()> {
        match response.code {
            ResponseCode::Ok => {}
            ResponseCode::EntityReauth => {
                warn!(identity = %self.identity, "Authority requires re-authentication");
                self.store.clear(&self.identity);
                return Ok(());
            }
            code => {
                debug!(identity = %self.identity, code = %code, "Request not accepted");
                return Ok(());
            }
        }

        let Some(key_response) = &response.key_response_data else {
            return Ok(());
        };
        let master_token = &key_response.master_token;
        if master_token.identity() != self.identity {
            return Err(TrustError::key_exchange(KeyExchangeErrorKind::IdentityMismatch {
                expected: self.identity.clone(),
                actual: master_token.identity().to_string(),
            }));
        }
        let pending = pending.ok_or_else(|| TrustError::key_exchange(KeyExchangeErrorKind::MissingLocalKeyMaterial))?;

        let factory = self.key_exchange.get(key_response.params.scheme())?;
        let keys = factory.unwrap(&key_response.params, pending.local)?;
        let crypto_context: Arc<dyn CryptoContext> = Arc::new(SessionCryptoContext::new(&keys)?);
        self.store.renew(&self.identity, master_token.clone(), crypto_context)?;

        info!(
            identity = %self.identity,
            sequence_number = master_token.sequence_number(),
            serial_number = master_token.serial_number(),
            "Master token received"
        );
        Ok(())
    }

    /// Encode a header for the wire.
    pub fn encode_request<S: Serializer>(&self, serializer: &S, header: &MessageHeader) -> TrustResult<Vec<u8>> {
        serializer.encode(header)
    }

    /// Decode a response and absorb it, returning the decoded response.
    pub fn absorb_response_bytes<S: Serializer>(
        &self,
        serializer: &S,
        bytes: &[u8],
        pending: Option<PendingExchange>,
    ) -> TrustResult<MessageResponse> {
        let response: MessageResponse = serializer.decode(bytes)?;
        self.absorb_response(&response, pending)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::crypto::AuthorityKeys;
    use crate::keyx::{DiffieHellmanFactory, KeyExchangeFactory, KeyRequestData, KeyResponseData, WrapContext};
    use crate::tokens::TokenFactory;
    use chrono::Utc;
    use uuid::Uuid;

    fn session() -> EntitySession {
        EntitySession::new(
            EntityAuthData::None {
                identity: "device-1".to_string(),
            },
            Arc::new(TrustStore::new()),
        )
    }

    #[test]
    fn test_first_request_uses_entity_auth() {
        let session = session();
        let (header, pending) = session
            .build_request(RequestOptions::renew(KeyExchangeRequest::DiffieHellman))
            .unwrap();

        assert!(!header.is_signed());
        assert!(header.data().master_token.is_none());
        assert!(header.data().entity_auth_data.is_some());
        assert_eq!(pending.unwrap().scheme(), KeyExchangeScheme::DiffieHellman);
    }

    #[test]
    fn test_psk_request_needs_preshared_keys() {
        let session = session();
        assert!(session
            .build_request(RequestOptions::renew(KeyExchangeRequest::Psk))
            .is_err());

        let session = session
            .with_preshared_keys(&SessionKeys::generate().unwrap())
            .unwrap();
        assert!(session
            .build_request(RequestOptions::renew(KeyExchangeRequest::Psk))
            .is_ok());
    }

    #[test]
    fn test_session_request_needs_master_token() {
        let result = session().build_request(RequestOptions::renew(KeyExchangeRequest::Session));
        assert!(matches!(
            result,
            Err(TrustError::KeyExchange {
                kind: KeyExchangeErrorKind::MissingSessionContext
            })
        ));
    }

    /// Answer a Diffie-Hellman request the way the authority would.
    fn key_response(identity: &str, request: &KeyRequestData) -> MessageResponse {
        let tokens = TokenFactory::new(Arc::new(AuthorityKeys::generate().unwrap()), TokenConfig::default());
        let wrap = WrapContext {
            identity,
            session: None,
        };
        let (keys, params) = DiffieHellmanFactory::new().generate(request, &wrap).unwrap();
        let master_token = tokens.create_master_token(identity, &keys, Utc::now()).unwrap();
        MessageResponse::ok(Uuid::new_v4()).with_key_response(KeyResponseData { master_token, params })
    }

    #[test]
    fn test_absorb_key_response_then_sign() {
        let session = session();
        let (header, pending) = session
            .build_request(RequestOptions::renew(KeyExchangeRequest::DiffieHellman))
            .unwrap();
        let response = key_response("device-1", header.data().key_request_data.as_ref().unwrap());

        session.absorb_response(&response, pending).unwrap();
        assert!(session.is_trusted());

        let (header, pending) = session.build_request(RequestOptions::default()).unwrap();
        assert!(pending.is_none());
        assert!(header.is_signed());
        assert_eq!(header.data().master_token, response.master_token);

        let entry = session.store().get("device-1").unwrap();
        assert!(header.verify(entry.crypto_context().as_ref()).is_ok());
    }

    #[test]
    fn test_key_response_for_other_identity() {
        let session = session();
        let (header, pending) = session
            .build_request(RequestOptions::renew(KeyExchangeRequest::DiffieHellman))
            .unwrap();
        let response = key_response("device-2", header.data().key_request_data.as_ref().unwrap());

        assert!(matches!(
            session.absorb_response(&response, pending),
            Err(TrustError::KeyExchange {
                kind: KeyExchangeErrorKind::IdentityMismatch { .. }
            })
        ));
        assert!(!session.is_trusted());
    }

    #[test]
    fn test_key_response_without_pending_exchange() {
        let session = session();
        let (header, _) = session
            .build_request(RequestOptions::renew(KeyExchangeRequest::DiffieHellman))
            .unwrap();
        let response = key_response("device-1", header.data().key_request_data.as_ref().unwrap());
        assert!(session.absorb_response(&response, None).is_err());
    }

    #[test]
    fn test_entity_reauth_clears_trust() {
        let session = session();
        let (header, pending) = session
            .build_request(RequestOptions::renew(KeyExchangeRequest::DiffieHellman))
            .unwrap();
        let response = key_response("device-1", header.data().key_request_data.as_ref().unwrap());
        session.absorb_response(&response, pending).unwrap();

        let expired = MessageResponse {
            code: ResponseCode::Expired,
            ..MessageResponse::ok(Uuid::new_v4())
        };
        session.absorb_response(&expired, None).unwrap();
        assert!(session.is_trusted());

        let reauth = MessageResponse {
            code: ResponseCode::EntityReauth,
            ..MessageResponse::ok(Uuid::new_v4())
        };
        session.absorb_response(&reauth, None).unwrap();
        assert!(!session.is_trusted());

        let (header, _) = session.build_request(RequestOptions::default()).unwrap();
        assert!(header.data().entity_auth_data.is_some());
    }
}
