//! TTL-bounded seen set backing replay protection and webhook de-duplication.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::ports::{
    ProcessedEventStore, ProcessedEventStoreError, ReplayGuard, ReplayGuardError,
};

/// Keys mapped to the instant they stop counting as seen.
///
/// Expired keys are swept on every insert, so memory is bounded by the
/// number of keys inserted within one TTL.
pub struct TtlSeenSet {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl TtlSeenSet {
    /// Create an empty set reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, HashMap<String, DateTime<Utc>>>> {
        self.entries.lock().ok()
    }

    /// Insert `key` unless it is present and unexpired. `None` when the lock
    /// is poisoned.
    fn insert_fresh(&self, key: &str, ttl: TimeDelta) -> Option<bool> {
        let now = self.clock.utc();
        let mut entries = self.lock()?;
        entries.retain(|_, expires_at| *expires_at > now);
        if entries.contains_key(key) {
            return Some(false);
        }
        entries.insert(key.to_owned(), now + ttl);
        Some(true)
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.utc();
        self.lock()
            .map(|entries| entries.values().filter(|at| **at > now).count())
            .unwrap_or_default()
    }

    /// Whether no live keys remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReplayGuard for TtlSeenSet {
    async fn check_and_insert(&self, key: &str, ttl: TimeDelta) -> Result<bool, ReplayGuardError> {
        self.insert_fresh(key, ttl)
            .ok_or_else(|| ReplayGuardError::unavailable("replay guard lock poisoned"))
    }
}

#[async_trait]
impl ProcessedEventStore for TtlSeenSet {
    async fn claim(&self, event_id: &str, ttl: TimeDelta) -> Result<bool, ProcessedEventStoreError> {
        self.insert_fresh(event_id, ttl)
            .ok_or_else(|| ProcessedEventStoreError::unavailable("event store lock poisoned"))
    }

    async fn release(&self, event_id: &str) -> Result<(), ProcessedEventStoreError> {
        let mut entries = self
            .lock()
            .ok_or_else(|| ProcessedEventStoreError::unavailable("event store lock poisoned"))?;
        entries.remove(event_id);
        Ok(())
    }
}
