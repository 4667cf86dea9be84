//! Fully wired in-memory service graph for end-to-end HTTP tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::envelope::{EnvelopeConfig, EnvelopePorts, EnvelopeService};
use crate::domain::one_time_code::{MfaConfig, MfaPorts, MfaService};
use crate::domain::payment::{PaymentPorts, PaymentReconciliationService, ReconciliationConfig};
use crate::domain::ports::{
    ArtifactRenderer, ArtifactRendererError, CodeDelivery, NoOpReconciliationMetrics, Notifier,
    NotifierError, ProvisioningNotice, RenderRequest,
};
use crate::domain::signed_link::{LinkCodec, LinkCodecConfig, SignedLinkService, SigningSecret};
use crate::inbound::http::origin::OriginPolicy;
use crate::inbound::http::session::MFA_SESSION_TTL_SECS;
use crate::inbound::http::state::{HttpPolicy, HttpState, HttpStatePorts};
use crate::inbound::http::webhook_signature::WebhookVerifier;
use crate::outbound::logging::TracingSecurityEventLog;
use crate::outbound::memory::{
    InMemoryEnvelopeRepository, InMemoryOneTimeCodeStore, InMemoryTotpSecretStore, TtlSeenSet,
};

use super::MutableClock;

/// Secret shared by every harness; long enough for release validation.
pub const HARNESS_SECRET: &[u8] = b"harness-signing-secret-0123456789abcdef";
/// Instant the harness clock starts at: 2026-01-15T10:00:00Z.
pub const HARNESS_START_MILLIS: i64 = 1_768_471_200_000;

/// Renderer that remembers every request.
#[derive(Default)]
pub struct RecordingRenderer {
    requests: Mutex<Vec<RenderRequest>>,
}

impl RecordingRenderer {
    /// Requests received so far.
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactRenderer for RecordingRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), ArtifactRendererError> {
        self.requests
            .lock()
            .map_err(|_| ArtifactRendererError::transport("recorder poisoned"))?
            .push(request.clone());
        Ok(())
    }
}

/// Notifier that remembers codes and provisioning notices.
#[derive(Default)]
pub struct RecordingNotifier {
    codes: Mutex<Vec<CodeDelivery>>,
    notices: Mutex<Vec<ProvisioningNotice>>,
}

impl RecordingNotifier {
    /// Codes delivered so far.
    pub fn codes(&self) -> Vec<CodeDelivery> {
        self.codes.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Most recent code sent to `target`.
    pub fn last_code_for(&self, target: &str) -> Option<String> {
        self.codes()
            .into_iter()
            .rev()
            .find(|delivery| delivery.target == target)
            .map(|delivery| delivery.code)
    }

    /// Provisioning notices sent so far.
    pub fn notices(&self) -> Vec<ProvisioningNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_code(&self, delivery: &CodeDelivery) -> Result<(), NotifierError> {
        self.codes
            .lock()
            .map_err(|_| NotifierError::transport("recorder poisoned"))?
            .push(delivery.clone());
        Ok(())
    }

    async fn send_provisioning(&self, notice: &ProvisioningNotice) -> Result<(), NotifierError> {
        self.notices
            .lock()
            .map_err(|_| NotifierError::transport("recorder poisoned"))?
            .push(notice.clone());
        Ok(())
    }
}

/// Service graph over in-memory adapters with handles for assertions.
pub struct Harness {
    pub clock: Arc<MutableClock>,
    pub codec: Arc<LinkCodec>,
    pub envelopes: Arc<InMemoryEnvelopeRepository>,
    pub renderer: Arc<RecordingRenderer>,
    pub notifier: Arc<RecordingNotifier>,
    pub webhook: Option<WebhookVerifier>,
    pub origins: OriginPolicy,
}

impl Harness {
    /// Graph with an open origin policy and unsigned webhooks.
    ///
    /// # Panics
    /// Panics if [`HARNESS_SECRET`] is rejected, which it never is.
    pub fn new() -> Self {
        let clock = Arc::new(MutableClock::at_millis(HARNESS_START_MILLIS));
        let secret = match SigningSecret::new(HARNESS_SECRET.to_vec()) {
            Ok(secret) => secret,
            Err(error) => panic!("harness secret rejected: {error}"),
        };
        let codec = Arc::new(LinkCodec::new(
            secret,
            clock.clone(),
            LinkCodecConfig::default(),
        ));
        Self {
            clock,
            codec,
            envelopes: Arc::new(InMemoryEnvelopeRepository::new()),
            renderer: Arc::new(RecordingRenderer::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            webhook: None,
            origins: OriginPolicy::new(Vec::<String>::new()),
        }
    }

    /// Require gateway webhooks to be signed with `verifier`.
    #[must_use]
    pub fn with_webhook(mut self, verifier: WebhookVerifier) -> Self {
        self.webhook = Some(verifier);
        self
    }

    /// Restrict guest endpoints to `origins`.
    #[must_use]
    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    /// Build handler state over this graph.
    pub fn state(&self) -> HttpState {
        let audit = Arc::new(TracingSecurityEventLog);
        let envelope_service = Arc::new(EnvelopeService::new(
            EnvelopePorts {
                repository: self.envelopes.clone(),
                renderer: self.renderer.clone(),
                audit: audit.clone(),
            },
            self.codec.clone(),
            self.clock.clone(),
            EnvelopeConfig::default(),
        ));
        let links = SignedLinkService::new(
            self.codec.clone(),
            Arc::new(TtlSeenSet::new(self.clock.clone())),
            audit.clone(),
        );
        let mfa = MfaService::new(
            MfaPorts {
                codes: Arc::new(InMemoryOneTimeCodeStore::new()),
                totp_secrets: Arc::new(InMemoryTotpSecretStore::new()),
                replay_guard: Arc::new(TtlSeenSet::new(self.clock.clone())),
                notifier: self.notifier.clone(),
                audit,
            },
            self.clock.clone(),
            MfaConfig::default(),
        );
        let payments = PaymentReconciliationService::new(
            PaymentPorts {
                envelopes: self.envelopes.clone(),
                processed_events: Arc::new(TtlSeenSet::new(self.clock.clone())),
                notifier: self.notifier.clone(),
                metrics: Arc::new(NoOpReconciliationMetrics),
            },
            self.clock.clone(),
            ReconciliationConfig::default(),
        );

        HttpState::new(
            HttpStatePorts {
                envelopes: envelope_service.clone(),
                envelopes_query: envelope_service,
                links: Arc::new(links),
                mfa: Arc::new(mfa),
                payments: Arc::new(payments),
            },
            HttpPolicy {
                origins: self.origins.clone(),
                webhook: self.webhook.clone(),
                link_ttl_ms: self.codec.link_ttl().num_milliseconds(),
                mfa_session_ttl_secs: MFA_SESSION_TTL_SECS,
            },
            self.clock.clone(),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
