//! Tracing-backed adapters: the security audit trail, plus stand-ins for the
//! renderer and notifier when no collaborator URL is configured.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::ports::{
    ArtifactRenderer, ArtifactRendererError, CodeDelivery, Notifier, NotifierError,
    ProvisioningNotice, RenderRequest, SecurityEvent, SecurityEventKind, SecurityEventLog,
    SecurityEventLogError,
};

/// Writes security events to the `security` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSecurityEventLog;

const fn is_failure(kind: SecurityEventKind) -> bool {
    matches!(
        kind,
        SecurityEventKind::SignatureVerificationFailed | SecurityEventKind::MfaVerificationFailed
    )
}

#[async_trait]
impl SecurityEventLog for TracingSecurityEventLog {
    async fn record(&self, event: SecurityEvent) -> Result<(), SecurityEventLogError> {
        let SecurityEvent {
            kind,
            reason,
            envelope_id,
            subject,
            client,
        } = event;
        let ip = client.ip_or_unknown();
        let user_agent = client.user_agent.as_deref().unwrap_or("unknown");
        if is_failure(kind) {
            warn!(
                target: "security",
                event = kind.as_str(),
                reason = reason.unwrap_or("unspecified"),
                envelope_id = ?envelope_id,
                subject = ?subject,
                ip = %ip,
                user_agent = %user_agent,
                "security check failed"
            );
        } else {
            info!(
                target: "security",
                event = kind.as_str(),
                envelope_id = ?envelope_id,
                subject = ?subject,
                ip = %ip,
                user_agent = %user_agent,
                "security event"
            );
        }
        Ok(())
    }
}

/// Renderer stand-in that only logs the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingArtifactRenderer;

#[async_trait]
impl ArtifactRenderer for LoggingArtifactRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), ArtifactRendererError> {
        info!(
            envelope_id = %request.envelope_id,
            project_id = %request.project_id,
            contract_ref = %request.contract_ref,
            "renderer not configured; skipping artifact render"
        );
        Ok(())
    }
}

/// Notifier stand-in that logs deliveries without their secrets.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_code(&self, delivery: &CodeDelivery) -> Result<(), NotifierError> {
        info!(
            delivery_target = %delivery.target,
            method = %delivery.method,
            "notifier not configured; verification code not delivered"
        );
        Ok(())
    }

    async fn send_provisioning(&self, notice: &ProvisioningNotice) -> Result<(), NotifierError> {
        info!(
            email = %notice.email,
            reference = %notice.reference,
            "notifier not configured; provisioning notice not delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::ClientContext;
    use crate::domain::one_time_code::DeliveryMethod;

    #[rstest]
    #[case(SecurityEventKind::SignatureVerified, false)]
    #[case(SecurityEventKind::SignatureVerificationFailed, true)]
    #[case(SecurityEventKind::GuestEnvelopeSigned, false)]
    #[case(SecurityEventKind::MfaVerified, false)]
    #[case(SecurityEventKind::MfaVerificationFailed, true)]
    fn failures_are_classified(#[case] kind: SecurityEventKind, #[case] expected: bool) {
        assert_eq!(is_failure(kind), expected);
    }

    #[tokio::test]
    async fn audit_log_accepts_events() {
        let event = SecurityEvent::new(
            SecurityEventKind::SignatureVerificationFailed,
            ClientContext::default(),
        )
        .with_reason("invalid_signature")
        .with_envelope("3fa85f64-5717-4562-b3fc-2c963f66afa6");
        assert!(TracingSecurityEventLog.record(event).await.is_ok());
    }

    #[tokio::test]
    async fn fallbacks_never_fail() {
        let delivery = CodeDelivery {
            target: "ada@example.com".to_owned(),
            method: DeliveryMethod::Email,
            code: "123456".to_owned(),
        };
        assert!(LoggingNotifier.send_code(&delivery).await.is_ok());

        let request = RenderRequest {
            envelope_id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_owned(),
            project_id: "sirsi".to_owned(),
            signer_name: "Ada".to_owned(),
            signer_email: "ada@example.com".to_owned(),
            signature_image: None,
            signed_at: Utc::now(),
            plan_details: "Standard Plan".to_owned(),
            contract_ref: "SIRSI-3fa85f64".to_owned(),
        };
        assert!(LoggingArtifactRenderer.render(&request).await.is_ok());
    }
}
