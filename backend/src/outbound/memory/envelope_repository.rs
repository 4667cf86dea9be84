//! Versioned in-memory envelope store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::envelope::{Envelope, EnvelopeId};
use crate::domain::ports::{EnvelopeRepository, EnvelopeRepositoryError};

/// Envelope repository backed by a mutex-guarded map.
///
/// `update_if_unchanged` compares the caller's version with the stored one
/// under the lock, so two writers that read the same version cannot both
/// succeed.
#[derive(Debug, Default)]
pub struct InMemoryEnvelopeRepository {
    envelopes: Mutex<HashMap<EnvelopeId, Envelope>>,
}

impl InMemoryEnvelopeRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<EnvelopeId, Envelope>>, EnvelopeRepositoryError> {
        self.envelopes
            .lock()
            .map_err(|_| EnvelopeRepositoryError::connection("envelope store lock poisoned"))
    }
}

#[async_trait]
impl EnvelopeRepository for InMemoryEnvelopeRepository {
    async fn create(&self, envelope: &Envelope) -> Result<(), EnvelopeRepositoryError> {
        let mut envelopes = self.lock()?;
        if envelopes.contains_key(&envelope.id()) {
            return Err(EnvelopeRepositoryError::duplicate_envelope(
                envelope.id().to_string(),
            ));
        }
        envelopes.insert(envelope.id(), envelope.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        envelope_id: &EnvelopeId,
    ) -> Result<Option<Envelope>, EnvelopeRepositoryError> {
        Ok(self.lock()?.get(envelope_id).cloned())
    }

    async fn update_if_unchanged(
        &self,
        envelope: &Envelope,
    ) -> Result<Envelope, EnvelopeRepositoryError> {
        let mut envelopes = self.lock()?;
        let Some(stored) = envelopes.get_mut(&envelope.id()) else {
            return Err(EnvelopeRepositoryError::query(format!(
                "envelope {} does not exist",
                envelope.id()
            )));
        };
        if stored.version() != envelope.version() {
            return Err(EnvelopeRepositoryError::version_conflict(
                envelope.id().to_string(),
            ));
        }
        let mut next = envelope.clone();
        next.set_version(envelope.version() + 1);
        *stored = next.clone();
        Ok(next)
    }
}
