//! Authority-side message processing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::crypto::{CryptoContext, SessionCryptoContext};
use crate::entityauth::EntityAuthData;
use crate::error::{KeyExchangeErrorKind, TokenErrorKind, TrustError, TrustResult};
use crate::keyx::{KeyResponseData, WrapContext};
use crate::protocol::{EntityCredentials, HeaderData, MessageHeader, MessageResponse, Serializer};
use crate::tokens::{MasterToken, SequenceSpace, ServiceToken, UserIdToken};

use super::context::AuthorityContext;

/// Sequence number of the first master token in a trust context.
const INITIAL_SEQUENCE_NUMBER: u64 = 0;
use super::state::TrustState;

/// Response plus the trust state the message drove its entity to.
#[derive(Debug, Clone)]
pub struct Processed {
    pub response: MessageResponse,
    pub state: TrustState,
}

/// The trust authority: validates presented credentials, issues and renews
/// master tokens.
///
/// Cheap to share behind an `Arc`; every message for one entity is
/// serialized on that entity's [`TrustStore`](crate::store::TrustStore)
/// lock while messages for different entities run in parallel.
pub struct Authority {
    context: AuthorityContext,
}

impl Authority {
    pub fn new(context: AuthorityContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AuthorityContext {
        &self.context
    }

    /// Start the background replay-guard cleanup task.
    pub fn start_replay_cleanup(&self) -> JoinHandle<()> {
        self.context
            .replay
            .start_cleanup_task(self.context.cleanup_interval)
    }

    /// Process one message and return the response to send.
    pub async fn receive(&self, header: &MessageHeader) -> MessageResponse {
        self.process(header).await.response
    }

    /// Decode a header, process it and encode the response.
    ///
    /// A header that fails to decode is answered with `FAIL` under the nil
    /// message id.
    pub async fn receive_bytes<S: Serializer>(&self, serializer: &S, bytes: &[u8]) -> TrustResult<Vec<u8>> {
        let response = match serializer.decode::<MessageHeader>(bytes) {
            Ok(header) => self.receive(&header).await,
            Err(error) => {
                warn!(error = %error, "Rejecting undecodable message");
                MessageResponse::error(Uuid::nil(), &error)
            }
        };
        serializer.encode(&response)
    }

    /// Process one message, reporting the resulting trust state as well.
    pub async fn process(&self, header: &MessageHeader) -> Processed {
        let message_id = header.message_id();
        match self.handle(header).await {
            Ok(processed) => processed,
            Err(error) => {
                warn!(
                    message_id = %message_id,
                    code = %error.response_code(),
                    error = %error,
                    "Message rejected"
                );
                Processed {
                    response: MessageResponse::error(message_id, &error),
                    state: TrustState::Rejected,
                }
            }
        }
    }

    async fn handle(&self, header: &MessageHeader) -> TrustResult<Processed> {
        match header.data().entity_credentials()? {
            EntityCredentials::MasterToken(token) => self.handle_master_token(header, token).await,
            EntityCredentials::EntityAuth(auth) => self.handle_entity_auth(header, auth).await,
        }
    }

    async fn handle_master_token(&self, header: &MessageHeader, token: &MasterToken) -> TrustResult<Processed> {
        let data = header.data();
        let now = self.context.clock.now();
        let authority = self.context.authority_keys().context();

        // Integrity first: token signature, then the header under the
        // token's own session keys.
        let validity = token.validate(now, authority)?;
        let session = SessionCryptoContext::new(&token.session_keys(authority)?)?;
        header.verify(&session)?;

        let identity = token.identity();
        let _guard = self.context.store.lock(identity).await;
        let newest = self.context.store.get(identity);

        if let Some(entry) = &newest {
            let current = entry.master_token();
            if current.serial_number() != token.serial_number() {
                return Err(TrustError::token(TokenErrorKind::SerialNumberMismatch {
                    identity: identity.to_string(),
                }));
            }
            let drift = SequenceSpace::drift(token.sequence_number(), current.sequence_number());
            if drift > self.context.max_sequence_drift() {
                return Err(TrustError::token(TokenErrorKind::SequenceOutOfSync {
                    identity: identity.to_string(),
                    presented: token.sequence_number(),
                    newest: current.sequence_number(),
                }));
            }
        }

        let renewing = data.renewable && validity.renewable && data.key_request_data.is_some();
        if validity.expired && !renewing {
            return Err(TrustError::token(TokenErrorKind::MasterTokenExpired {
                identity: identity.to_string(),
            }));
        }
        self.check_replay(data, identity, token.sequence_number())?;

        let Some(request) = data.key_request_data.as_ref().filter(|_| renewing) else {
            let user_id_token = self.process_user(data, identity, token, now)?;
            let service_tokens = self.filter_service_tokens(data, Some(token), user_id_token.as_ref())?;
            self.record_replay(data, identity, token.sequence_number(), token, now);

            debug!(
                identity = %identity,
                sequence_number = token.sequence_number(),
                "Master token accepted"
            );
            return Ok(Processed {
                response: MessageResponse::ok(data.message_id)
                    .with_master_token(token.clone())
                    .with_user_id_token(user_id_token)
                    .with_service_tokens(service_tokens),
                state: TrustState::Trusted,
            });
        };

        if let Some(entry) = &newest {
            if entry.master_token().is_newer_than(token) {
                return Err(TrustError::token(TokenErrorKind::RenewalConflict {
                    identity: identity.to_string(),
                    presented: token.sequence_number(),
                    newest: entry.master_token().sequence_number(),
                }));
            }
        }

        let factory = self.context.key_exchange.get(request.scheme())?;
        let wrap = WrapContext {
            identity,
            session: Some(&session),
        };
        let (keys, params) = factory.generate(request, &wrap)?;
        let renewed = self.context.tokens.renew_master_token(token, &keys, now)?;
        let crypto_context: Arc<dyn CryptoContext> = Arc::new(SessionCryptoContext::new(&keys)?);

        let user_id_token = self.process_user(data, identity, &renewed, now)?;
        let service_tokens = self.filter_service_tokens(data, Some(&renewed), user_id_token.as_ref())?;

        self.context
            .store
            .renew(identity, renewed.clone(), crypto_context)?;
        self.record_replay(data, identity, token.sequence_number(), token, now);

        info!(
            identity = %identity,
            sequence_number = renewed.sequence_number(),
            serial_number = renewed.serial_number(),
            scheme = %request.scheme(),
            "Master token renewed"
        );
        Ok(Processed {
            response: MessageResponse::ok(data.message_id)
                .with_key_response(KeyResponseData {
                    master_token: renewed,
                    params,
                })
                .with_user_id_token(user_id_token)
                .with_service_tokens(service_tokens),
            state: TrustState::Renewing,
        })
    }

    async fn handle_entity_auth(&self, header: &MessageHeader, auth: &EntityAuthData) -> TrustResult<Processed> {
        let data = header.data();
        let identity = self.context.entity_auth.verify(auth)?;

        let Some(request) = &data.key_request_data else {
            if data.renewable {
                return Err(TrustError::key_exchange(KeyExchangeErrorKind::KeyExchangeRequired));
            }
            debug!(identity = %identity, "Entity authenticated without key exchange");
            return Ok(Processed {
                response: MessageResponse::ok(data.message_id),
                state: TrustState::Authenticating,
            });
        };

        let _guard = self.context.store.lock(&identity).await;
        let now = self.context.clock.now();
        self.check_replay(data, &identity, INITIAL_SEQUENCE_NUMBER)?;

        let factory = self.context.key_exchange.get(request.scheme())?;
        let wrap = WrapContext {
            identity: &identity,
            session: None,
        };
        let (keys, params) = factory.generate(request, &wrap)?;
        let master_token = self.context.tokens.create_master_token(&identity, &keys, now)?;
        let crypto_context: Arc<dyn CryptoContext> = Arc::new(SessionCryptoContext::new(&keys)?);

        let user_id_token = self.process_user(data, &identity, &master_token, now)?;
        let service_tokens = self.filter_service_tokens(data, Some(&master_token), user_id_token.as_ref())?;

        self.context
            .store
            .renew(&identity, master_token.clone(), crypto_context)?;
        self.record_replay(data, &identity, INITIAL_SEQUENCE_NUMBER, &master_token, now);

        info!(
            identity = %identity,
            scheme = %auth.scheme(),
            serial_number = master_token.serial_number(),
            "Trust established"
        );
        Ok(Processed {
            response: MessageResponse::ok(data.message_id)
                .with_key_response(KeyResponseData {
                    master_token,
                    params,
                })
                .with_user_id_token(user_id_token)
                .with_service_tokens(service_tokens),
            state: TrustState::Trusted,
        })
    }

    /// Validate, renew or issue the user ID token for this message.
    fn process_user(
        &self,
        data: &HeaderData,
        identity: &str,
        master_token: &MasterToken,
        now: DateTime<Utc>,
    ) -> TrustResult<Option<UserIdToken>> {
        let tokens = &self.context.tokens;

        if let Some(user_id_token) = &data.user_id_token {
            user_id_token.verify(tokens.authority().context())?;
            if !user_id_token.is_bound_to(master_token) {
                return Err(TrustError::token(TokenErrorKind::UserIdTokenNotBound));
            }

            let renew = if user_id_token.is_expired(now) {
                if !data.renewable {
                    return Err(TrustError::token(TokenErrorKind::UserIdTokenExpired));
                }
                true
            } else {
                data.renewable && user_id_token.is_renewable(now)
            };

            if renew {
                debug!(identity = %identity, user = %user_id_token.user(), "Renewing user ID token");
                return tokens
                    .renew_user_id_token(user_id_token, master_token, now)
                    .map(Some);
            }
            return Ok(Some(user_id_token.clone()));
        }

        if let Some(user_auth) = &data.user_auth_data {
            let user = self.context.user_auth.verify(identity, user_auth)?;
            info!(identity = %identity, user = %user, "User authenticated");
            return tokens.create_user_id_token(&user, master_token, now).map(Some);
        }

        Ok(None)
    }

    /// Verify presented service tokens and drop those bound elsewhere.
    fn filter_service_tokens(
        &self,
        data: &HeaderData,
        master_token: Option<&MasterToken>,
        user_id_token: Option<&UserIdToken>,
    ) -> TrustResult<Vec<ServiceToken>> {
        let authority = self.context.authority_keys().context();
        let mut kept = Vec::with_capacity(data.service_tokens.len());

        for service_token in &data.service_tokens {
            service_token.verify(authority)?;

            if service_token.is_master_token_bound()
                && !master_token.is_some_and(|t| service_token.is_bound_to_master_token(t))
            {
                warn!(name = %service_token.name(), "Discarding service token bound to another master token");
                continue;
            }
            if service_token.is_user_id_token_bound()
                && !user_id_token.is_some_and(|t| service_token.is_bound_to_user_id_token(t))
            {
                warn!(name = %service_token.name(), "Discarding service token bound to another user ID token");
                continue;
            }
            kept.push(service_token.clone());
        }
        Ok(kept)
    }

    /// Reject a non-replayable message whose nonce was already accepted.
    ///
    /// Runs under the entity lock, so nothing can record the same nonce
    /// between this check and [`record_replay`](Self::record_replay).
    fn check_replay(&self, data: &HeaderData, identity: &str, sequence_number: u64) -> TrustResult<()> {
        if data.non_replayable && self.context.replay.is_replay(identity, sequence_number, data.message_id) {
            return Err(TrustError::token(TokenErrorKind::Replayed {
                message_id: data.message_id.to_string(),
                sequence_number,
            }));
        }
        Ok(())
    }

    /// Remember the nonce of an accepted non-replayable message for as long
    /// as `master_token` stays valid.
    fn record_replay(
        &self,
        data: &HeaderData,
        identity: &str,
        sequence_number: u64,
        master_token: &MasterToken,
        now: DateTime<Utc>,
    ) {
        if !data.non_replayable {
            return;
        }
        let lifetime = (master_token.expiration() - now).to_std().unwrap_or_default();
        self.context
            .replay
            .record(identity, sequence_number, data.message_id, lifetime);
    }
}
