//! Everything the authority consults while processing messages.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{ReplayConfig, Settings, TokenConfig};
use crate::crypto::AuthorityKeys;
use crate::entityauth::{EntityAuthRegistry, EntityAuthenticator, PresharedKeyAuthenticator};
use crate::error::TrustResult;
use crate::keyx::{KeyExchangeFactory, KeyExchangeRegistry, PresharedKeyStore, SymmetricWrappedFactory};
use crate::store::{ReplayGuard, TrustStore};
use crate::tokens::{Clock, SystemClock, TokenFactory};
use crate::userauth::{UserAuthRegistry, UserAuthenticator};

/// Authority configuration and collaborators.
///
/// Defaults: unauthenticated entities only, the user ID token user scheme,
/// all three key exchange schemes with no pre-shared keys, the system clock
/// and a fresh empty [`TrustStore`].
pub struct AuthorityContext {
    pub(super) identity: String,
    pub(super) tokens: TokenFactory,
    pub(super) entity_auth: EntityAuthRegistry,
    pub(super) user_auth: UserAuthRegistry,
    pub(super) key_exchange: KeyExchangeRegistry,
    pub(super) store: Arc<TrustStore>,
    pub(super) replay: Arc<ReplayGuard>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) cleanup_interval: Duration,
}

impl AuthorityContext {
    /// Create a context with the default collaborators.
    ///
    /// A zero cleanup interval is raised to one second.
    pub fn new(
        identity: impl Into<String>,
        authority: Arc<AuthorityKeys>,
        tokens: TokenConfig,
        replay: &ReplayConfig,
    ) -> Self {
        let preshared: Arc<dyn PresharedKeyStore> =
            Arc::new(std::collections::HashMap::<String, crate::crypto::SessionKeys>::new());
        Self {
            identity: identity.into(),
            user_auth: UserAuthRegistry::with_defaults(Arc::clone(&authority)),
            tokens: TokenFactory::new(authority, tokens),
            entity_auth: EntityAuthRegistry::with_unauthenticated(),
            key_exchange: KeyExchangeRegistry::with_defaults(preshared),
            store: Arc::new(TrustStore::new()),
            replay: Arc::new(ReplayGuard::new(Duration::from_secs(replay.nonce_ttl_seconds))),
            clock: Arc::new(SystemClock),
            cleanup_interval: Duration::from_secs(replay.cleanup_interval_seconds.max(1)),
        }
    }

    /// Build from validated settings, loading the authority secret from
    /// `authority.secret_path`.
    ///
    /// Without a secret path, throwaway keys are generated: tokens issued
    /// by this process will not verify after a restart.
    pub fn from_settings(settings: &Settings) -> TrustResult<Self> {
        settings.validate()?;

        let keys = match &settings.authority.secret_path {
            Some(path) => {
                info!(path = %path.display(), "Loading authority secret");
                AuthorityKeys::load(path)?
            }
            None => {
                warn!("No authority secret configured, generating ephemeral keys");
                AuthorityKeys::generate()?
            }
        };

        Ok(Self::new(
            settings.authority.identity.clone(),
            Arc::new(keys),
            settings.tokens.clone(),
            &settings.replay,
        ))
    }

    /// Register an additional entity authentication scheme.
    pub fn with_entity_authenticator(mut self, authenticator: Arc<dyn EntityAuthenticator>) -> Self {
        self.entity_auth.register(authenticator);
        self
    }

    /// Register an additional user authentication scheme.
    pub fn with_user_authenticator(mut self, authenticator: Arc<dyn UserAuthenticator>) -> Self {
        self.user_auth.register(authenticator);
        self
    }

    /// Register a key exchange scheme, replacing any factory for the same scheme.
    pub fn with_key_exchange_factory(mut self, factory: Arc<dyn KeyExchangeFactory>) -> Self {
        self.key_exchange.register(factory);
        self
    }

    /// Enable the `Psk` entity scheme and `Psk`-wrapped key exchange over
    /// `keys`.
    pub fn with_preshared_keys(self, keys: Arc<dyn PresharedKeyStore>) -> Self {
        self.with_entity_authenticator(Arc::new(PresharedKeyAuthenticator::new(Arc::clone(&keys))))
            .with_key_exchange_factory(Arc::new(SymmetricWrappedFactory::new(keys)))
    }

    /// Use `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing store, e.g. across authority instances in one process.
    pub fn with_store(mut self, store: Arc<TrustStore>) -> Self {
        self.store = store;
        self
    }

    /// Get the authority's own identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Get the trust store.
    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    pub fn tokens(&self) -> &TokenFactory {
        &self.tokens
    }

    /// Get the keys tokens are signed and sealed under.
    pub fn authority_keys(&self) -> &AuthorityKeys {
        self.tokens.authority()
    }

    pub fn max_sequence_drift(&self) -> u64 {
        self.tokens.config().max_sequence_drift
    }

    /// Get the replay guard for non-replayable messages.
    pub fn replay(&self) -> &Arc<ReplayGuard> {
        &self.replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_settings_with_secret_file() {
        let mut secret = NamedTempFile::new().unwrap();
        secret.write_all(&[7u8; 48]).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(secret.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        }

        let mut settings = Settings::default();
        settings.authority.secret_path = Some(secret.path().to_path_buf());
        settings.tokens.max_sequence_drift = 8;

        let context = AuthorityContext::from_settings(&settings).unwrap();
        assert_eq!(context.max_sequence_drift(), 8);
        assert!(context.store().is_empty());
    }

    #[test]
    fn test_zero_cleanup_interval_clamped() {
        let replay = ReplayConfig {
            cleanup_interval_seconds: 0,
            ..ReplayConfig::default()
        };
        let context = AuthorityContext::new(
            "authority",
            Arc::new(AuthorityKeys::generate().unwrap()),
            TokenConfig::default(),
            &replay,
        );
        assert_eq!(context.cleanup_interval, Duration::from_secs(1));
        assert!(context.replay().is_empty());
    }

    #[test]
    fn test_from_settings_rejects_invalid() {
        let mut settings = Settings::default();
        settings.tokens.expiration_offset_seconds = settings.tokens.renewal_offset_seconds;
        assert!(AuthorityContext::from_settings(&settings).is_err());
    }
}
