//! Driving port for envelope reads.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::envelope::{Envelope, EnvelopeId};

/// Domain use-case port for reading envelopes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvelopeQuery: Send + Sync {
    /// Load an envelope, failing with `not_found` when it does not exist.
    async fn get(&self, envelope_id: &EnvelopeId) -> Result<Envelope, Error>;
}
