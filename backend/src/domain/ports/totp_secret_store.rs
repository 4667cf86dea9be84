//! Port for per-identity TOTP secrets.

use async_trait::async_trait;

use crate::domain::one_time_code::TotpSecret;

use super::define_port_error;

define_port_error! {
    /// Errors raised by TOTP secret store adapters.
    pub enum TotpSecretStoreError {
        /// Store connection could not be established.
        Connection { message: String } =>
            "TOTP secret store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "TOTP secret store query failed: {message}",
    }
}

/// Stored TOTP enrolment for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpEnrollment {
    /// Shared secret.
    pub secret: TotpSecret,
    /// Set after the first successful verification.
    pub enrolled: bool,
}

/// Port for provisioning and reading TOTP secrets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TotpSecretStore: Send + Sync {
    /// Enrolment for `identity`, if provisioned.
    async fn find(&self, identity: &str) -> Result<Option<TotpEnrollment>, TotpSecretStoreError>;

    /// Store `secret` unless one already exists; returns whichever is stored.
    async fn insert_if_absent(
        &self,
        identity: &str,
        secret: TotpSecret,
    ) -> Result<TotpEnrollment, TotpSecretStoreError>;

    /// Flag the identity as having completed enrolment.
    async fn mark_enrolled(&self, identity: &str) -> Result<(), TotpSecretStoreError>;
}
