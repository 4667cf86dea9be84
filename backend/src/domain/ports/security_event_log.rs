//! Port for the security audit trail.

use async_trait::async_trait;

use crate::domain::ClientContext;

use super::define_port_error;

define_port_error! {
    /// Errors raised by audit log adapters.
    pub enum SecurityEventLogError {
        /// The audit sink rejected the write.
        Write { message: String } => "security event write failed: {message}",
    }
}

/// Kinds of audited events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    /// A signed link verified and a session token was issued.
    SignatureVerified,
    /// A signed link failed verification.
    SignatureVerificationFailed,
    /// A signature was appended to a guest envelope.
    GuestEnvelopeSigned,
    /// An MFA code or TOTP verified.
    MfaVerified,
    /// An MFA code or TOTP was rejected.
    MfaVerificationFailed,
}

impl SecurityEventKind {
    /// Stable event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignatureVerified => "signature_verified",
            Self::SignatureVerificationFailed => "signature_verification_failed",
            Self::GuestEnvelopeSigned => "guest_envelope_signed",
            Self::MfaVerified => "mfa_verified",
            Self::MfaVerificationFailed => "mfa_verification_failed",
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    /// What happened.
    pub kind: SecurityEventKind,
    /// Tagged failure reason; never shown to callers.
    pub reason: Option<&'static str>,
    /// Envelope involved, if any.
    pub envelope_id: Option<String>,
    /// Signer, target, or user involved, if any.
    pub subject: Option<String>,
    /// Caller details.
    pub client: ClientContext,
}

impl SecurityEvent {
    /// Start an event of `kind` for `client`.
    #[must_use]
    pub const fn new(kind: SecurityEventKind, client: ClientContext) -> Self {
        Self {
            kind,
            reason: None,
            envelope_id: None,
            subject: None,
            client,
        }
    }

    /// Attach a failure reason tag.
    #[must_use]
    pub const fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Attach the envelope id.
    #[must_use]
    pub fn with_envelope(mut self, envelope_id: impl Into<String>) -> Self {
        self.envelope_id = Some(envelope_id.into());
        self
    }

    /// Attach the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Audit sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityEventLog: Send + Sync {
    /// Append an event.
    async fn record(&self, event: SecurityEvent) -> Result<(), SecurityEventLogError>;
}
