//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;

use crate::domain::ports::{
    MockEnvelopeCommand, MockEnvelopeQuery, MockLinkVerificationCommand, MockMfaCommand,
    MockPaymentWebhookCommand,
};
use crate::domain::signed_link::LINK_TTL_MS;
use crate::inbound::http::origin::OriginPolicy;
use crate::inbound::http::session::MFA_SESSION_TTL_SECS;
use crate::inbound::http::state::{HttpPolicy, HttpState, HttpStatePorts};
use crate::test_support::MutableClock;

/// Session middleware with a fresh key, cookie name `session`, and the
/// `Secure` flag off so plain-HTTP test requests carry the cookie.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Fixed instant used by handler tests: 2026-01-15T10:00:00Z.
pub const TEST_NOW_MILLIS: i64 = 1_768_471_200_000;

/// Mock driving ports with no expectations; tests configure the ones they
/// exercise and any unexpected call panics.
#[derive(Default)]
pub struct TestPorts {
    pub envelopes: MockEnvelopeCommand,
    pub envelopes_query: MockEnvelopeQuery,
    pub links: MockLinkVerificationCommand,
    pub mfa: MockMfaCommand,
    pub payments: MockPaymentWebhookCommand,
}

impl TestPorts {
    /// Build handler state with an open origin policy and no webhook check.
    pub fn into_state(self) -> HttpState {
        self.into_state_with(test_policy())
    }

    /// Build handler state with a custom policy.
    pub fn into_state_with(self, policy: HttpPolicy) -> HttpState {
        HttpState::new(
            HttpStatePorts {
                envelopes: Arc::new(self.envelopes),
                envelopes_query: Arc::new(self.envelopes_query),
                links: Arc::new(self.links),
                mfa: Arc::new(self.mfa),
                payments: Arc::new(self.payments),
            },
            policy,
            Arc::new(MutableClock::at_millis(TEST_NOW_MILLIS)),
        )
    }
}

/// Permissive policy: every origin, unsigned webhooks.
pub fn test_policy() -> HttpPolicy {
    HttpPolicy {
        origins: OriginPolicy::new(Vec::<String>::new()),
        webhook: None,
        link_ttl_ms: LINK_TTL_MS,
        mfa_session_ttl_secs: MFA_SESSION_TTL_SECS,
    }
}
