//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`*Command`, `*Query`) are called by inbound adapters;
//! driven ports are implemented by outbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod artifact_renderer;
mod envelope_command;
mod envelope_query;
mod envelope_repository;
mod link_verification_command;
mod mfa_command;
mod notifier;
mod one_time_code_store;
mod payment_webhook_command;
mod processed_event_store;
mod reconciliation_metrics;
mod replay_guard;
mod security_event_log;
mod totp_secret_store;

#[cfg(test)]
pub use artifact_renderer::MockArtifactRenderer;
pub use artifact_renderer::{ArtifactRenderer, ArtifactRendererError, RenderRequest};
#[cfg(test)]
pub use envelope_command::MockEnvelopeCommand;
pub use envelope_command::{
    CreateEnvelopeRequest, CreateGuestEnvelopeRequest, EnvelopeCommand, EnvelopeCreated,
    GuestEnvelopeCreated, Recipient, SignEnvelopeRequest, SignatureAccepted, SignerLink,
};
#[cfg(test)]
pub use envelope_query::MockEnvelopeQuery;
pub use envelope_query::EnvelopeQuery;
#[cfg(test)]
pub use envelope_repository::MockEnvelopeRepository;
pub use envelope_repository::{EnvelopeRepository, EnvelopeRepositoryError};
#[cfg(test)]
pub use link_verification_command::MockLinkVerificationCommand;
pub use link_verification_command::{
    LinkVerificationCommand, VerifiedSession, VerifyLinkRequest,
};
#[cfg(test)]
pub use mfa_command::MockMfaCommand;
pub use mfa_command::{
    CodeIssued, MfaChallenge, MfaCommand, MfaVerified, ProvisionTotpRequest, SendCodeRequest,
    TotpProvisioning, VerifyMfaRequest,
};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{CodeDelivery, Notifier, NotifierError, ProvisioningNotice};
#[cfg(test)]
pub use one_time_code_store::MockOneTimeCodeStore;
pub use one_time_code_store::{OneTimeCodeStore, OneTimeCodeStoreError};
#[cfg(test)]
pub use payment_webhook_command::MockPaymentWebhookCommand;
pub use payment_webhook_command::PaymentWebhookCommand;
#[cfg(test)]
pub use processed_event_store::MockProcessedEventStore;
pub use processed_event_store::{ProcessedEventStore, ProcessedEventStoreError};
pub use reconciliation_metrics::{
    NoOpReconciliationMetrics, ReconciliationMetrics, ReconciliationMetricsError,
};
#[cfg(test)]
pub use replay_guard::MockReplayGuard;
pub use replay_guard::{ReplayGuard, ReplayGuardError};
#[cfg(test)]
pub use security_event_log::MockSecurityEventLog;
pub use security_event_log::{
    SecurityEvent, SecurityEventKind, SecurityEventLog, SecurityEventLogError,
};
#[cfg(test)]
pub use totp_secret_store::MockTotpSecretStore;
pub use totp_secret_store::{TotpEnrollment, TotpSecretStore, TotpSecretStoreError};
