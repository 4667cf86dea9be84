//! Domain port surface for recording payment reconciliation outcomes.
//!
//! Keeps the webhook handler independent of any metrics backend.

use async_trait::async_trait;

use crate::domain::payment::ReconciliationOutcome;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording reconciliation metrics.
    pub enum ReconciliationMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "reconciliation metrics exporter failed: {message}",
    }
}

/// Metrics recording port for webhook outcomes.
#[async_trait]
pub trait ReconciliationMetrics: Send + Sync {
    /// Count one handled gateway event.
    async fn record(&self, outcome: &ReconciliationOutcome)
    -> Result<(), ReconciliationMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpReconciliationMetrics;

#[async_trait]
impl ReconciliationMetrics for NoOpReconciliationMetrics {
    async fn record(
        &self,
        _outcome: &ReconciliationOutcome,
    ) -> Result<(), ReconciliationMetricsError> {
        Ok(())
    }
}
