//! Port for persisting issued email/SMS verification codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::one_time_code::OneTimeCodeRecord;

use super::define_port_error;

define_port_error! {
    /// Errors raised by one-time code store adapters.
    pub enum OneTimeCodeStoreError {
        /// Store connection could not be established.
        Connection { message: String } =>
            "one-time code store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "one-time code store query failed: {message}",
    }
}

/// Port for issuing, looking up, and consuming channel codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OneTimeCodeStore: Send + Sync {
    /// Store `record`, invalidating any earlier code for the same target.
    async fn replace_for_target(
        &self,
        record: OneTimeCodeRecord,
    ) -> Result<(), OneTimeCodeStoreError>;

    /// The code for `target` that is still valid at `now`.
    async fn find_active(
        &self,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OneTimeCodeRecord>, OneTimeCodeStoreError>;

    /// Atomically remove a code. Returns `false` if it was already gone.
    async fn consume(&self, record_id: Uuid) -> Result<bool, OneTimeCodeStoreError>;

    /// Count a wrong guess against a code, returning the new total.
    async fn record_failed_attempt(&self, record_id: Uuid) -> Result<u32, OneTimeCodeStoreError>;
}
