//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` so they depend only on driving
//! ports and stay testable without I/O.

use std::sync::Arc;

use mockable::Clock;

use crate::domain::ports::{
    EnvelopeCommand, EnvelopeQuery, LinkVerificationCommand, MfaCommand, PaymentWebhookCommand,
};
use crate::inbound::http::origin::OriginPolicy;
use crate::inbound::http::webhook_signature::WebhookVerifier;

/// Parameter object bundling the driving ports.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub envelopes: Arc<dyn EnvelopeCommand>,
    pub envelopes_query: Arc<dyn EnvelopeQuery>,
    pub links: Arc<dyn LinkVerificationCommand>,
    pub mfa: Arc<dyn MfaCommand>,
    pub payments: Arc<dyn PaymentWebhookCommand>,
}

/// Adapter-level policy that is not a domain concern.
#[derive(Clone)]
pub struct HttpPolicy {
    /// Browser origins allowed to call guest endpoints.
    pub origins: OriginPolicy,
    /// Gateway signature check; `None` accepts unsigned webhooks.
    pub webhook: Option<WebhookVerifier>,
    /// Signed-link lifetime reported by the status endpoint.
    pub link_ttl_ms: i64,
    /// How long an MFA verification in the cookie session stays valid.
    pub mfa_session_ttl_secs: i64,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub envelopes: Arc<dyn EnvelopeCommand>,
    pub envelopes_query: Arc<dyn EnvelopeQuery>,
    pub links: Arc<dyn LinkVerificationCommand>,
    pub mfa: Arc<dyn MfaCommand>,
    pub payments: Arc<dyn PaymentWebhookCommand>,
    pub policy: HttpPolicy,
    pub clock: Arc<dyn Clock>,
}

impl HttpState {
    /// Assemble state from ports, adapter policy, and a clock.
    pub fn new(ports: HttpStatePorts, policy: HttpPolicy, clock: Arc<dyn Clock>) -> Self {
        let HttpStatePorts {
            envelopes,
            envelopes_query,
            links,
            mfa,
            payments,
        } = ports;
        Self {
            envelopes,
            envelopes_query,
            links,
            mfa,
            payments,
            policy,
            clock,
        }
    }
}
