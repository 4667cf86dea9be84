//! Port for envelope persistence with conditional (optimistic) updates.

use async_trait::async_trait;

use crate::domain::envelope::{Envelope, EnvelopeId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by envelope repository adapters.
    pub enum EnvelopeRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "envelope repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "envelope repository query failed: {message}",
        /// An envelope with the same id already exists.
        DuplicateEnvelope { envelope_id: String } =>
            "envelope {envelope_id} already exists",
        /// The stored version no longer matches the caller's copy.
        VersionConflict { envelope_id: String } =>
            "envelope {envelope_id} was modified concurrently",
    }
}

/// Port for reading and conditionally writing envelopes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvelopeRepository: Send + Sync {
    /// Insert a new envelope.
    async fn create(&self, envelope: &Envelope) -> Result<(), EnvelopeRepositoryError>;

    /// Find an envelope by id.
    async fn find_by_id(
        &self,
        envelope_id: &EnvelopeId,
    ) -> Result<Option<Envelope>, EnvelopeRepositoryError>;

    /// Replace the stored envelope only if its version still equals
    /// `envelope.version()`. Returns the stored copy carrying the new version.
    async fn update_if_unchanged(
        &self,
        envelope: &Envelope,
    ) -> Result<Envelope, EnvelopeRepositoryError>;
}
