//! In-memory replay guard for non-replayable messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

type ReplayKey = (String, u64, Uuid);

/// Thread-safe record of seen `(entity, sequence number, message id)`
/// triples with TTL-based expiry.
///
/// A triple is remembered for at least the configured TTL and at least as
/// long as the master token it arrived under stays valid, so a captured
/// message cannot be replayed while its token is still accepted.
pub struct ReplayGuard {
    seen: Mutex<HashMap<ReplayKey, Instant>>,
    ttl: Duration,
}

impl ReplayGuard {
    /// Create a new replay guard with the given minimum retention.
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ReplayKey, Instant>> {
        match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Check whether the triple was already recorded and is still retained.
    ///
    /// Does not record anything; callers record with [`record`](Self::record)
    /// once the message has been fully accepted.
    pub fn is_replay(&self, identity: &str, sequence_number: u64, message_id: Uuid) -> bool {
        let mut seen = self.entries();
        let now = Instant::now();

        // Lazy cleanup
        seen.retain(|_, expiry| *expiry > now);

        seen.contains_key(&(identity.to_string(), sequence_number, message_id))
    }

    /// Record the triple, retained for the TTL or `token_lifetime`,
    /// whichever is longer.
    pub fn record(&self, identity: &str, sequence_number: u64, message_id: Uuid, token_lifetime: Duration) {
        let retention = self.ttl.max(token_lifetime);
        let mut seen = self.entries();
        seen.insert(
            (identity.to_string(), sequence_number, message_id),
            Instant::now() + retention,
        );
    }

    /// Get the number of retained triples.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if the guard is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries().retain(|_, expiry| *expiry > now);
    }

    /// Spawn a tokio task that calls [`cleanup`](Self::cleanup) every `interval`.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;
                guard.cleanup();
            }
        })
    }
}
