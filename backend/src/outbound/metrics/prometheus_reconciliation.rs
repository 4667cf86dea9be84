//! Prometheus adapter for payment reconciliation metrics.
//!
//! Outcomes are exported as a single labelled counter registered with the
//! same registry that backs the `/metrics` endpoint.

use async_trait::async_trait;
use prometheus::{IntCounterVec, Opts, Registry};

use crate::domain::payment::ReconciliationOutcome;
use crate::domain::ports::{ReconciliationMetrics, ReconciliationMetricsError};

/// Prometheus-backed reconciliation outcome counter.
///
/// # Metric
///
/// - **Name**: `envelope_payment_webhook_events_total`
/// - **Type**: Counter
/// - **Labels**:
///   - `outcome`: `applied`, `unchanged`, `duplicate`, `ignored`,
///     `unknown_envelope`, or `missing_correlation`
pub struct PrometheusReconciliationMetrics {
    events_total: IntCounterVec,
}

impl PrometheusReconciliationMetrics {
    /// Create and register the counter with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let events_total = IntCounterVec::new(
            Opts::new(
                "envelope_payment_webhook_events_total",
                "Payment gateway webhook events by reconciliation outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(events_total.clone()))?;
        Ok(Self { events_total })
    }
}

#[async_trait]
impl ReconciliationMetrics for PrometheusReconciliationMetrics {
    async fn record(
        &self,
        outcome: &ReconciliationOutcome,
    ) -> Result<(), ReconciliationMetricsError> {
        self.events_total
            .get_metric_with_label_values(&[outcome.label()])
            .map_err(|error| ReconciliationMetricsError::export(error.to_string()))?
            .inc();
        Ok(())
    }
}
