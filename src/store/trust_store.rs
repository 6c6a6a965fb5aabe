//! Per-entity trust contexts: the live master token and its crypto context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::crypto::CryptoContext;
use crate::error::{AuthErrorKind, TokenErrorKind, TrustError, TrustResult};
use crate::tokens::MasterToken;

/// One live trust context. Replaced whole, never mutated.
pub struct TrustEntry {
    master_token: MasterToken,
    crypto_context: Arc<dyn CryptoContext>,
}

impl TrustEntry {
    /// Get the newest master token issued in this context.
    pub fn master_token(&self) -> &MasterToken {
        &self.master_token
    }

    /// Get the crypto context for the token's session keys.
    pub fn crypto_context(&self) -> Arc<dyn CryptoContext> {
        Arc::clone(&self.crypto_context)
    }
}

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Held while validating and renewing one entity's trust context.
///
/// Dropping the last guard for an identity, with no task waiting on it,
/// removes that identity's lock from the store.
pub struct EntityGuard {
    guard: Option<OwnedMutexGuard<()>>,
    identity: String,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        // Release before checking, so our own clone is no longer counted.
        drop(self.guard.take());

        let mut locks = lock_map(&self.locks);
        if locks
            .get(&self.identity)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.identity);
        }
    }
}

/// Map of entity identity to its live [`TrustEntry`].
///
/// Readers clone an `Arc<TrustEntry>` and never observe a half-replaced
/// pair. Writers for one entity serialize on [`TrustStore::lock`]; distinct
/// entities never contend on it.
#[derive(Default)]
pub struct TrustStore {
    entries: RwLock<HashMap<String, Arc<TrustEntry>>>,
    locks: Arc<Mutex<LockMap>>,
}

impl TrustStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entity's live trust context, if any.
    pub fn get(&self, identity: &str) -> Option<Arc<TrustEntry>> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(identity).cloned()
    }

    /// Acquire the per-entity lock.
    pub async fn lock(&self, identity: &str) -> EntityGuard {
        let lock = Arc::clone(lock_map(&self.locks).entry(identity.to_string()).or_default());
        EntityGuard {
            guard: Some(lock.lock_owned().await),
            identity: identity.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Install `master_token` and `crypto_context` as the entity's live pair.
    ///
    /// A token from the same trust context (same serial number) must be
    /// newer than the stored one; a different serial number is a full
    /// re-authentication and replaces the entry outright.
    pub fn renew(
        &self,
        identity: &str,
        master_token: MasterToken,
        crypto_context: Arc<dyn CryptoContext>,
    ) -> TrustResult<()> {
        if master_token.identity() != identity {
            return Err(TrustError::Auth {
                kind: AuthErrorKind::EntityMismatch {
                    expected: identity.to_string(),
                    actual: master_token.identity().to_string(),
                },
            });
        }

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(current) = entries.get(identity) {
            let current = &current.master_token;
            if current.serial_number() == master_token.serial_number()
                && !master_token.is_newer_than(current)
            {
                return Err(TrustError::token(TokenErrorKind::NotNewer {
                    identity: identity.to_string(),
                }));
            }
        }

        info!(
            identity = %identity,
            sequence_number = master_token.sequence_number(),
            serial_number = master_token.serial_number(),
            "Trust context installed"
        );
        entries.insert(
            identity.to_string(),
            Arc::new(TrustEntry {
                master_token,
                crypto_context,
            }),
        );
        Ok(())
    }

    /// Evict the entity's trust context.
    pub fn clear(&self, identity: &str) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.remove(identity).is_some() {
            debug!(identity = %identity, "Trust context cleared");
        }
    }

    /// Evict every trust context.
    pub fn clear_all(&self) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.clear();
    }

    /// Get the number of live trust contexts.
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        lock_map(&self.locks).len()
    }
}
