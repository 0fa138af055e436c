//! Circuit breakers shared by every worker, written through to disk.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use fleetpull_core::ItemId;
use fleetpull_state::{CircuitBreaker, StateStore};

/// Shared [`CircuitBreaker`]. Every open/close is saved to the run's
/// `breakers.json` (when a store is attached) while the lock is held, so
/// saves are serialized.
#[derive(Debug)]
pub struct SharedBreakers {
    inner: Mutex<CircuitBreaker>,
    store: Option<StateStore>,
}

impl SharedBreakers {
    pub fn new(breaker: CircuitBreaker, store: Option<StateStore>) -> Self {
        Self {
            inner: Mutex::new(breaker),
            store,
        }
    }

    /// In-memory only.
    pub fn detached(breaker: CircuitBreaker) -> Self {
        Self::new(breaker, None)
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Cooldown left for `id`, `None` when the breaker is closed.
    pub fn remaining(&self, id: &ItemId) -> Option<Duration> {
        self.lock().remaining(id)
    }

    pub fn open(&self, id: &ItemId) {
        let mut breaker = self.lock();
        breaker.trip(id);
        tracing::info!(item = %id, cooldown_s = breaker.cooldown().as_secs(), "circuit breaker opened");
        self.persist(&breaker);
    }

    pub fn close(&self, id: &ItemId) {
        let mut breaker = self.lock();
        if breaker.clear(id) {
            tracing::debug!(item = %id, "circuit breaker cleared");
            self.persist(&breaker);
        }
    }

    pub fn snapshot(&self) -> CircuitBreaker {
        self.lock().clone()
    }

    fn persist(&self, breaker: &CircuitBreaker) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save_breakers(breaker) {
            tracing::warn!(error = %err, "failed to persist circuit breakers");
        }
    }
}
