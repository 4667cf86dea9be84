//! Driving port for signed-link verification and session token checks.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::signed_link::SessionToken;
use crate::domain::{ClientContext, Error};

/// A presented link query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyLinkRequest {
    /// Raw query string, with or without the leading `?`. Kept raw so the
    /// parameter order survives.
    pub query: String,
    /// Caller details for the audit trail.
    pub client: ClientContext,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    /// Caller parameters in their original order.
    pub params: Vec<(String, String)>,
    /// Session token proving the verification.
    pub session: SessionToken,
}

/// Domain use-case port for link verification.
///
/// All failures surface as one `forbidden` error; the tagged reason is only
/// written to the security log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkVerificationCommand: Send + Sync {
    /// Verify a signed link once and issue a session token.
    async fn verify_link(&self, request: VerifyLinkRequest) -> Result<VerifiedSession, Error>;

    /// Check a session token and return its claims.
    async fn verify_session(
        &self,
        token: &str,
        signature: &str,
    ) -> Result<Map<String, Value>, Error>;
}
