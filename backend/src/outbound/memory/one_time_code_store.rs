//! In-memory channel code store holding at most one code per target.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::one_time_code::OneTimeCodeRecord;
use crate::domain::ports::{OneTimeCodeStore, OneTimeCodeStoreError};

/// Codes keyed by normalised target.
#[derive(Debug, Default)]
pub struct InMemoryOneTimeCodeStore {
    codes: Mutex<HashMap<String, OneTimeCodeRecord>>,
}

impl InMemoryOneTimeCodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, OneTimeCodeRecord>>, OneTimeCodeStoreError> {
        self.codes
            .lock()
            .map_err(|_| OneTimeCodeStoreError::connection("code store lock poisoned"))
    }
}

fn by_id(
    codes: &mut HashMap<String, OneTimeCodeRecord>,
    record_id: Uuid,
) -> Option<&mut OneTimeCodeRecord> {
    codes.values_mut().find(|record| record.id == record_id)
}

#[async_trait]
impl OneTimeCodeStore for InMemoryOneTimeCodeStore {
    async fn replace_for_target(
        &self,
        record: OneTimeCodeRecord,
    ) -> Result<(), OneTimeCodeStoreError> {
        self.lock()?.insert(record.target.clone(), record);
        Ok(())
    }

    async fn find_active(
        &self,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OneTimeCodeRecord>, OneTimeCodeStoreError> {
        let mut codes = self.lock()?;
        match codes.get(target) {
            Some(record) if record.is_active_at(now) => Ok(Some(record.clone())),
            Some(_) => {
                codes.remove(target);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn consume(&self, record_id: Uuid) -> Result<bool, OneTimeCodeStoreError> {
        let mut codes = self.lock()?;
        let before = codes.len();
        codes.retain(|_, record| record.id != record_id);
        Ok(codes.len() < before)
    }

    async fn record_failed_attempt(&self, record_id: Uuid) -> Result<u32, OneTimeCodeStoreError> {
        let mut codes = self.lock()?;
        let record = by_id(&mut codes, record_id).ok_or_else(|| {
            OneTimeCodeStoreError::query(format!("code {record_id} is no longer stored"))
        })?;
        record.failed_attempts = record.failed_attempts.saturating_add(1);
        Ok(record.failed_attempts)
    }
}
