//! In-memory TOTP enrolment store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::one_time_code::TotpSecret;
use crate::domain::ports::{TotpEnrollment, TotpSecretStore, TotpSecretStoreError};

/// Enrolments keyed by identity.
#[derive(Debug, Default)]
pub struct InMemoryTotpSecretStore {
    secrets: Mutex<HashMap<String, TotpEnrollment>>,
}

impl InMemoryTotpSecretStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, TotpEnrollment>>, TotpSecretStoreError> {
        self.secrets
            .lock()
            .map_err(|_| TotpSecretStoreError::connection("TOTP store lock poisoned"))
    }
}

#[async_trait]
impl TotpSecretStore for InMemoryTotpSecretStore {
    async fn find(&self, identity: &str) -> Result<Option<TotpEnrollment>, TotpSecretStoreError> {
        Ok(self.lock()?.get(identity).cloned())
    }

    async fn insert_if_absent(
        &self,
        identity: &str,
        secret: TotpSecret,
    ) -> Result<TotpEnrollment, TotpSecretStoreError> {
        let mut secrets = self.lock()?;
        let stored = secrets
            .entry(identity.to_owned())
            .or_insert_with(|| TotpEnrollment {
                secret,
                enrolled: false,
            });
        Ok(stored.clone())
    }

    async fn mark_enrolled(&self, identity: &str) -> Result<(), TotpSecretStoreError> {
        let mut secrets = self.lock()?;
        let enrollment = secrets.get_mut(identity).ok_or_else(|| {
            TotpSecretStoreError::query(format!("no TOTP secret for {identity}"))
        })?;
        enrollment.enrolled = true;
        Ok(())
    }
}
