//! Link verification with nonce replay protection and audit logging.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::canonical::parse_query;
use super::codec::{LinkCodec, LinkError, VerifiedLink};
use crate::domain::ports::{
    LinkVerificationCommand, ReplayGuard, SecurityEvent, SecurityEventKind, SecurityEventLog,
    VerifiedSession, VerifyLinkRequest,
};
use crate::domain::{ClientContext, Error};

/// Link parameter carrying the envelope id.
pub const ENVELOPE_PARAM: &str = "envelope";
/// Link parameter carrying the project id.
pub const PROJECT_PARAM: &str = "project";
/// Link parameter carrying the signer email.
pub const SIGNER_PARAM: &str = "signer";

const LINK_DENIED: &str = "link verification failed";
const SESSION_DENIED: &str = "session verification failed";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims<'a> {
    envelope_id: Option<&'a str>,
    project_id: Option<&'a str>,
    signer: Option<&'a str>,
    verified: bool,
}

/// Verifies links exactly once and issues session tokens.
#[derive(Clone)]
pub struct SignedLinkService {
    codec: Arc<LinkCodec>,
    replay_guard: Arc<dyn ReplayGuard>,
    audit: Arc<dyn SecurityEventLog>,
    replay_window: TimeDelta,
}

impl SignedLinkService {
    /// Remember nonces for the link lifetime.
    pub fn new(
        codec: Arc<LinkCodec>,
        replay_guard: Arc<dyn ReplayGuard>,
        audit: Arc<dyn SecurityEventLog>,
    ) -> Self {
        let replay_window = codec.link_ttl();
        Self {
            codec,
            replay_guard,
            audit,
            replay_window,
        }
    }

    /// Override how long consumed nonces are remembered. Never shorter than
    /// the link lifetime.
    #[must_use]
    pub fn with_replay_window(mut self, window: TimeDelta) -> Self {
        self.replay_window = window.max(self.codec.link_ttl());
        self
    }

    /// Underlying codec, for minting.
    #[must_use]
    pub fn codec(&self) -> &LinkCodec {
        &self.codec
    }

    /// Verify and consume a presented link.
    ///
    /// The outer error is an upstream failure of the replay guard; the
    /// inner one is the tagged rejection.
    pub async fn consume(
        &self,
        presented: &[(String, String)],
    ) -> Result<Result<VerifiedLink, LinkError>, Error> {
        let verified = match self.codec.verify(presented) {
            Ok(verified) => verified,
            Err(err) => return Ok(Err(err)),
        };
        let fresh = self
            .replay_guard
            .check_and_insert(&format!("link:{}", verified.nonce), self.replay_window)
            .await
            .map_err(|err| Error::service_unavailable(err.to_string()))?;
        if fresh {
            Ok(Ok(verified))
        } else {
            Ok(Err(LinkError::LinkReplayed))
        }
    }

    async fn audit(&self, event: SecurityEvent) {
        if let Err(err) = self.audit.record(event).await {
            warn!(error = %err, "failed to write security event");
        }
    }

    async fn reject(&self, err: LinkError, client: ClientContext) -> Error {
        debug!(reason = err.reason(), detail = %err, "signed link rejected");
        self.audit(
            SecurityEvent::new(SecurityEventKind::SignatureVerificationFailed, client)
                .with_reason(err.reason()),
        )
        .await;
        Error::forbidden(LINK_DENIED)
    }
}

#[async_trait]
impl LinkVerificationCommand for SignedLinkService {
    async fn verify_link(&self, request: VerifyLinkRequest) -> Result<VerifiedSession, Error> {
        let VerifyLinkRequest { query, client } = request;
        let presented = parse_query(&query);
        let verified = match self.consume(&presented).await? {
            Ok(verified) => verified,
            Err(err) => return Err(self.reject(err, client).await),
        };

        let claims = SessionClaims {
            envelope_id: verified.param(ENVELOPE_PARAM),
            project_id: verified.param(PROJECT_PARAM),
            signer: verified.param(SIGNER_PARAM),
            verified: true,
        };
        let session = self
            .codec
            .issue_session_token(&claims)
            .map_err(|err| Error::internal(err.to_string()))?;

        let mut event = SecurityEvent::new(SecurityEventKind::SignatureVerified, client);
        if let Some(envelope_id) = verified.param(ENVELOPE_PARAM) {
            event = event.with_envelope(envelope_id);
        }
        if let Some(signer) = verified.param(SIGNER_PARAM) {
            event = event.with_subject(signer);
        }
        self.audit(event).await;

        Ok(VerifiedSession {
            params: verified.params,
            session,
        })
    }

    async fn verify_session(
        &self,
        token: &str,
        signature: &str,
    ) -> Result<Map<String, Value>, Error> {
        self.codec
            .verify_session_token(token, signature)
            .map_err(|err| {
                debug!(detail = %err, "session token rejected");
                Error::forbidden(SESSION_DENIED)
            })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use std::sync::Arc;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockReplayGuard, MockSecurityEventLog, ReplayGuardError};
    use crate::domain::signed_link::{LinkCodecConfig, SigningSecret};
    use crate::test_support::MutableClock;

    const T0_MS: i64 = 1_700_000_000_000;

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::at_millis(T0_MS))
    }

    fn codec(clock: &Arc<MutableClock>) -> Arc<LinkCodec> {
        let secret = SigningSecret::new("s").expect("secret");
        Arc::new(LinkCodec::new(
            secret,
            Arc::clone(clock) as Arc<dyn mockable::Clock>,
            LinkCodecConfig::default(),
        ))
    }

    fn audit_expecting(kind: SecurityEventKind) -> MockSecurityEventLog {
        let mut audit = MockSecurityEventLog::new();
        audit
            .expect_record()
            .withf(move |event| event.kind == kind)
            .times(1)
            .returning(|_| Ok(()));
        audit
    }

    fn minted_query(codec: &LinkCodec) -> String {
        let params = vec![
            (ENVELOPE_PARAM.to_owned(), "e1".to_owned()),
            (SIGNER_PARAM.to_owned(), "a@x.com".to_owned()),
        ];
        let url = codec
            .mint("https://sign.example.com/sign.html", &params)
            .expect("mint");
        url.query().unwrap_or_default().to_owned()
    }

    fn request(query: String) -> VerifyLinkRequest {
        VerifyLinkRequest {
            query,
            client: ClientContext::default(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn verified_link_yields_session_carrying_envelope(clock: Arc<MutableClock>) {
        let codec = codec(&clock);
        let query = minted_query(&codec);
        let mut guard = MockReplayGuard::new();
        guard
            .expect_check_and_insert()
            .withf(|key, ttl| key.starts_with("link:") && *ttl == TimeDelta::minutes(5))
            .times(1)
            .returning(|_, _| Ok(true));
        let service = SignedLinkService::new(
            Arc::clone(&codec),
            Arc::new(guard),
            Arc::new(audit_expecting(SecurityEventKind::SignatureVerified)),
        );

        let verified = service.verify_link(request(query)).await.expect("verified");
        assert_eq!(
            verified.params,
            vec![
                ("envelope".to_owned(), "e1".to_owned()),
                ("signer".to_owned(), "a@x.com".to_owned()),
            ]
        );
        let claims = service
            .verify_session(&verified.session.token, &verified.session.signature)
            .await
            .expect("session verifies");
        assert_eq!(claims.get("envelopeId"), Some(&Value::from("e1")));
        assert_eq!(claims.get("verified"), Some(&Value::Bool(true)));
    }

    #[rstest]
    #[tokio::test]
    async fn replayed_nonce_is_denied(clock: Arc<MutableClock>) {
        let codec = codec(&clock);
        let query = minted_query(&codec);
        let mut guard = MockReplayGuard::new();
        guard.expect_check_and_insert().returning(|_, _| Ok(false));
        let service = SignedLinkService::new(
            codec,
            Arc::new(guard),
            Arc::new(audit_expecting(SecurityEventKind::SignatureVerificationFailed)),
        );

        let error = service.verify_link(request(query)).await.expect_err("denied");
        assert_eq!(error.code(), ErrorCode::Forbidden);
        assert_eq!(error.message(), LINK_DENIED);
    }

    #[rstest]
    #[tokio::test]
    async fn expired_link_never_touches_the_guard(clock: Arc<MutableClock>) {
        let codec = codec(&clock);
        let query = minted_query(&codec);
        clock.advance_seconds(301);
        let mut guard = MockReplayGuard::new();
        guard.expect_check_and_insert().never();
        let service = SignedLinkService::new(
            codec,
            Arc::new(guard),
            Arc::new(audit_expecting(SecurityEventKind::SignatureVerificationFailed)),
        );

        let error = service.verify_link(request(query)).await.expect_err("denied");
        assert_eq!(error.message(), LINK_DENIED);
    }

    #[rstest]
    #[tokio::test]
    async fn guard_outage_is_retryable(clock: Arc<MutableClock>) {
        let codec = codec(&clock);
        let query = minted_query(&codec);
        let mut guard = MockReplayGuard::new();
        guard
            .expect_check_and_insert()
            .returning(|_, _| Err(ReplayGuardError::unavailable("down")));
        let mut audit = MockSecurityEventLog::new();
        audit.expect_record().never();
        let service = SignedLinkService::new(codec, Arc::new(guard), Arc::new(audit));

        let error = service.verify_link(request(query)).await.expect_err("upstream");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }

    #[rstest]
    #[tokio::test]
    async fn tampered_session_is_denied(clock: Arc<MutableClock>) {
        let codec = codec(&clock);
        let session = codec
            .issue_session_token(&serde_json::json!({ "envelopeId": "e1" }))
            .expect("issue");
        let service = SignedLinkService::new(
            codec,
            Arc::new(MockReplayGuard::new()),
            Arc::new(MockSecurityEventLog::new()),
        );

        let error = service
            .verify_session(&session.token, "00")
            .await
            .expect_err("denied");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn replay_window_never_drops_below_link_ttl(clock: Arc<MutableClock>) {
        let service = SignedLinkService::new(
            codec(&clock),
            Arc::new(MockReplayGuard::new()),
            Arc::new(MockSecurityEventLog::new()),
        )
        .with_replay_window(TimeDelta::seconds(1));
        assert_eq!(service.replay_window, TimeDelta::minutes(5));
    }
}
