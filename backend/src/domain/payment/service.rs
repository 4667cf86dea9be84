//! Payment reconciliation service implementing [`PaymentWebhookCommand`].
//!
//! Each event id is claimed before any write and released again if the
//! write fails, so gateway retries are applied at most once but never lost.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};

use super::event::GatewayEvent;
use super::outcome::ReconciliationOutcome;
use crate::domain::Error;
use crate::domain::envelope::{EnvelopeId, PaymentStatus, PaymentTransition};
use crate::domain::ports::{
    EnvelopeRepository, EnvelopeRepositoryError, Notifier, PaymentWebhookCommand,
    ProcessedEventStore, ProvisioningNotice, ReconciliationMetrics,
};

/// Service settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// How long processed event ids are remembered.
    pub dedup_ttl: TimeDelta,
    /// Conditional-write attempts before giving up with a retryable error.
    pub max_write_attempts: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            dedup_ttl: TimeDelta::days(7),
            max_write_attempts: 5,
        }
    }
}

/// Collaborators for [`PaymentReconciliationService`].
#[derive(Clone)]
pub struct PaymentPorts {
    /// Envelope storage.
    pub envelopes: Arc<dyn EnvelopeRepository>,
    /// Event id de-duplication.
    pub processed_events: Arc<dyn ProcessedEventStore>,
    /// Provisioning notices.
    pub notifier: Arc<dyn Notifier>,
    /// Outcome counters.
    pub metrics: Arc<dyn ReconciliationMetrics>,
}

/// Applies gateway verdicts to envelopes.
#[derive(Clone)]
pub struct PaymentReconciliationService {
    envelopes: Arc<dyn EnvelopeRepository>,
    processed_events: Arc<dyn ProcessedEventStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn ReconciliationMetrics>,
    clock: Arc<dyn Clock>,
    config: ReconciliationConfig,
}

impl PaymentReconciliationService {
    /// Build the service.
    pub fn new(ports: PaymentPorts, clock: Arc<dyn Clock>, config: ReconciliationConfig) -> Self {
        Self {
            envelopes: ports.envelopes,
            processed_events: ports.processed_events,
            notifier: ports.notifier,
            metrics: ports.metrics,
            clock,
            config,
        }
    }

    fn map_repository_error(error: EnvelopeRepositoryError) -> Error {
        Error::service_unavailable(format!("envelope repository: {error}"))
    }

    async fn apply(
        &self,
        envelope_id: EnvelopeId,
        target: PaymentStatus,
        event: &GatewayEvent,
    ) -> Result<ReconciliationOutcome, Error> {
        let attempts = self.config.max_write_attempts.max(1);
        for attempt in 1..=attempts {
            let Some(mut envelope) = self
                .envelopes
                .find_by_id(&envelope_id)
                .await
                .map_err(Self::map_repository_error)?
            else {
                return Ok(ReconciliationOutcome::UnknownEnvelope);
            };

            let (from, to, provision) = match envelope.apply_payment(target, self.clock.utc()) {
                PaymentTransition::Unchanged { current } => {
                    return Ok(ReconciliationOutcome::Unchanged {
                        envelope_id,
                        current,
                    });
                }
                PaymentTransition::Applied {
                    from,
                    to,
                    provision,
                } => (from, to, provision),
            };

            match self.envelopes.update_if_unchanged(&envelope).await {
                Ok(_) => {}
                Err(EnvelopeRepositoryError::VersionConflict { .. }) => {
                    warn!(envelope_id = %envelope_id, attempt, "lost payment race; retrying");
                    continue;
                }
                Err(err) => return Err(Self::map_repository_error(err)),
            }

            info!(
                envelope_id = %envelope_id,
                event_id = %event.id,
                from = ?from,
                to = ?to,
                "payment status applied"
            );
            if provision {
                self.provision(envelope_id, event).await;
            }
            return Ok(ReconciliationOutcome::Applied {
                envelope_id,
                from,
                to,
                provisioned: provision,
            });
        }
        Err(Error::service_unavailable(
            "envelope is being modified concurrently; retry",
        ))
    }

    async fn provision(&self, envelope_id: EnvelopeId, event: &GatewayEvent) {
        let Some(email) = event.customer_email.clone() else {
            warn!(envelope_id = %envelope_id, "paid envelope has no customer email; notice skipped");
            return;
        };
        let notice = ProvisioningNotice {
            email,
            name: event.customer_name_or_default().to_owned(),
            reference: envelope_id.to_string(),
        };
        if let Err(err) = self.notifier.send_provisioning(&notice).await {
            warn!(envelope_id = %envelope_id, error = %err, "provisioning notice failed");
        }
    }

    async fn reconcile(&self, event: &GatewayEvent) -> Result<ReconciliationOutcome, Error> {
        let Some(target) = event.kind.target_status() else {
            return Ok(ReconciliationOutcome::Ignored {
                event_type: event.kind.event_type().to_owned(),
            });
        };
        let Some(correlation_id) = event.correlation_id.as_deref() else {
            return Ok(ReconciliationOutcome::MissingCorrelation);
        };
        let Ok(envelope_id) = correlation_id.parse::<EnvelopeId>() else {
            return Ok(ReconciliationOutcome::UnknownEnvelope);
        };

        let claimed = self
            .processed_events
            .claim(&event.id, self.config.dedup_ttl)
            .await
            .map_err(|err| Error::service_unavailable(err.to_string()))?;
        if !claimed {
            return Ok(ReconciliationOutcome::Duplicate);
        }

        let result = self.apply(envelope_id, target, event).await;
        if result.is_err() {
            if let Err(err) = self.processed_events.release(&event.id).await {
                warn!(event_id = %event.id, error = %err, "failed to release event claim");
            }
        }
        result
    }
}

#[async_trait]
impl PaymentWebhookCommand for PaymentReconciliationService {
    async fn handle_event(&self, event: GatewayEvent) -> Result<ReconciliationOutcome, Error> {
        let outcome = self.reconcile(&event).await?;
        info!(
            event_id = %event.id,
            event_type = event.kind.event_type(),
            outcome = outcome.label(),
            "gateway event handled"
        );
        if let Err(err) = self.metrics.record(&outcome).await {
            warn!(error = %err, "failed to record reconciliation metrics");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
