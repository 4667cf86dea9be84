//! Driving port for payment gateway webhooks.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::payment::{GatewayEvent, ReconciliationOutcome};

/// Domain use-case port for reconciling gateway events.
///
/// Every `Ok` outcome is acknowledged to the gateway. An `Err` is always
/// retryable: the event id is released so a redelivery is applied afresh.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentWebhookCommand: Send + Sync {
    /// Apply one decoded gateway event.
    async fn handle_event(&self, event: GatewayEvent) -> Result<ReconciliationOutcome, Error>;
}
