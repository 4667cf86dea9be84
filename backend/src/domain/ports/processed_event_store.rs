//! Port for de-duplicating payment gateway webhook deliveries.

use async_trait::async_trait;
use chrono::TimeDelta;

use super::define_port_error;

define_port_error! {
    /// Errors raised by processed-event store adapters.
    pub enum ProcessedEventStoreError {
        /// Backing store is unavailable.
        Unavailable { message: String } => "processed event store unavailable: {message}",
    }
}

/// Records gateway event ids that have been (or are being) applied.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Claim `event_id` for `ttl`. Returns `false` if it was already claimed.
    async fn claim(&self, event_id: &str, ttl: TimeDelta) -> Result<bool, ProcessedEventStoreError>;

    /// Drop a claim so a gateway retry can apply the event again.
    async fn release(&self, event_id: &str) -> Result<(), ProcessedEventStoreError>;
}
