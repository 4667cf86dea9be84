//! Result of handling one gateway event.

use crate::domain::envelope::{EnvelopeId, PaymentStatus};

/// What reconciliation did with an event. Every variant is acknowledged to
/// the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// The envelope's payment status moved forward.
    Applied {
        /// Envelope updated.
        envelope_id: EnvelopeId,
        /// Previous status.
        from: Option<PaymentStatus>,
        /// New status.
        to: PaymentStatus,
        /// Whether this event triggered the provisioning notice.
        provisioned: bool,
    },
    /// The event would have moved the status backwards; nothing written.
    Unchanged {
        /// Envelope inspected.
        envelope_id: EnvelopeId,
        /// Status left in place.
        current: Option<PaymentStatus>,
    },
    /// The event id was already processed.
    Duplicate,
    /// The event type is not one we act on.
    Ignored {
        /// Raw event type.
        event_type: String,
    },
    /// The correlation id does not resolve to an envelope.
    UnknownEnvelope,
    /// The event carried no correlation id.
    MissingCorrelation,
}

impl ReconciliationOutcome {
    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged { .. } => "unchanged",
            Self::Duplicate => "duplicate",
            Self::Ignored { .. } => "ignored",
            Self::UnknownEnvelope => "unknown_envelope",
            Self::MissingCorrelation => "missing_correlation",
        }
    }
}
