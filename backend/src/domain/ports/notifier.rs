//! Port for outbound email/SMS delivery.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::one_time_code::DeliveryMethod;

use super::define_port_error;

define_port_error! {
    /// Errors raised by notification transports.
    pub enum NotifierError {
        /// The transport could not be reached or timed out.
        Transport { message: String } => "notification transport failed: {message}",
        /// The transport refused the message.
        Rejected { status: u16, message: String } =>
            "notification rejected ({status}): {message}",
    }
}

/// A verification code to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDelivery {
    /// Email address or phone number.
    pub target: String,
    /// Channel to use.
    pub method: DeliveryMethod,
    /// The six-digit code.
    pub code: String,
}

/// Notice that a paid envelope is ready for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningNotice {
    /// Customer email.
    pub email: String,
    /// Customer display name.
    pub name: String,
    /// Envelope reference.
    pub reference: String,
}

/// Fire-and-forget delivery collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a verification code.
    async fn send_code(&self, delivery: &CodeDelivery) -> Result<(), NotifierError>;

    /// Deliver a provisioning notice.
    async fn send_provisioning(&self, notice: &ProvisioningNotice) -> Result<(), NotifierError>;
}
