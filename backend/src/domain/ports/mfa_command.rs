//! Driving port for MFA challenges.
//!
//! Inbound adapters call [`MfaCommand`] to issue channel codes, verify any
//! factor, and provision authenticator apps. Whether a session counts as
//! MFA-verified is the adapter's concern; this port only reports outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::one_time_code::{DeliveryMethod, MfaMethod};
use crate::domain::{ClientContext, Error};

/// Request to issue a channel code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCodeRequest {
    /// Identity the code is for, when known.
    pub user_id: Option<String>,
    /// Email address or phone number.
    pub target: String,
    /// Delivery channel.
    pub method: DeliveryMethod,
}

/// Acknowledgement of an issued code. The code itself is never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeIssued {
    /// Delivery channel used.
    pub method: DeliveryMethod,
    /// When the code stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// A factor submitted for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MfaChallenge {
    /// A code sent over email or SMS.
    Channel {
        /// Target the code was sent to.
        target: String,
        /// Channel the code was sent over.
        method: DeliveryMethod,
        /// Submitted code.
        code: String,
    },
    /// An authenticator app code.
    Totp {
        /// Identity holding the TOTP secret.
        user_id: String,
        /// Submitted code.
        code: String,
    },
}

/// Request to verify a factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyMfaRequest {
    /// What was submitted.
    pub challenge: MfaChallenge,
    /// Caller details for the audit trail.
    pub client: ClientContext,
}

/// Successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaVerified {
    /// Factor that was satisfied.
    pub method: MfaMethod,
    /// Identity resolved from the code or challenge, if any.
    pub user_id: Option<String>,
    /// Verification instant.
    pub verified_at: DateTime<Utc>,
}

/// Request to provision an authenticator app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionTotpRequest {
    /// Identity receiving the secret.
    pub user_id: String,
    /// Label shown in the authenticator app.
    pub account_name: String,
}

/// Stored TOTP enrolment details for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpProvisioning {
    /// Base32 secret.
    pub secret: String,
    /// `otpauth://` URI for QR rendering.
    pub provisioning_uri: String,
    /// Whether a code has already been verified against this secret.
    pub enrolled: bool,
}

/// Domain use-case port for MFA.
///
/// Every verification failure is reported as the same `forbidden` error;
/// the tagged reason only reaches the audit log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MfaCommand: Send + Sync {
    /// Issue a channel code and hand it to the notifier.
    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeIssued, Error>;

    /// Verify a channel code or TOTP.
    async fn verify(&self, request: VerifyMfaRequest) -> Result<MfaVerified, Error>;

    /// Return the stored TOTP secret for an identity, creating one if absent.
    async fn provision_totp(&self, request: ProvisionTotpRequest)
    -> Result<TotpProvisioning, Error>;
}
