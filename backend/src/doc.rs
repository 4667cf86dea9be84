//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP endpoint from the inbound layer together
//! with the request, response, and error schemas they reference. Swagger UI
//! serves it in debug builds and `cargo run --bin openapi-dump` exports it
//! for external tooling.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{Error, ErrorCode};
use crate::inbound::http::envelopes::{
    CreateEnvelopeBody, CreateGuestEnvelopeBody, EnvelopeCreatedBody, EnvelopeView,
    GuestEnvelopeCreatedBody, RecipientBody, SignEnvelopeBody, SignatureAcceptedBody,
    SignerLinkBody,
};
use crate::inbound::http::mfa::{
    CodeSentBody, MfaVerifiedBody, ProvisionTotpBody, SendCodeBody, TotpProvisioningBody,
    VerifyMfaBody,
};
use crate::inbound::http::payments::{PaymentStatusBody, WebhookAckBody};
use crate::inbound::http::security::{
    SecurityFeatures, SecurityStatusBody, VerifiedLinkBody, VerifyLinkBody,
};
use crate::inbound::http::session::MfaSessionStatus;

/// Document the cookie that carries MFA verification state.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie set by POST /api/security/mfa/verify.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Envelope backend API",
        description = "Guest signing envelopes, signed links, MFA, and payment reconciliation."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::envelopes::create_envelope,
        crate::inbound::http::envelopes::sign_envelope,
        crate::inbound::http::envelopes::create_guest_envelope,
        crate::inbound::http::envelopes::get_guest_envelope,
        crate::inbound::http::envelopes::sign_guest_envelope,
        crate::inbound::http::security::verify_link,
        crate::inbound::http::security::security_status,
        crate::inbound::http::mfa::send_code,
        crate::inbound::http::mfa::verify_mfa,
        crate::inbound::http::mfa::provision_totp,
        crate::inbound::http::mfa::mfa_status,
        crate::inbound::http::payments::payment_status,
        crate::inbound::http::payments::payment_webhook,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        RecipientBody,
        CreateEnvelopeBody,
        SignerLinkBody,
        EnvelopeCreatedBody,
        CreateGuestEnvelopeBody,
        GuestEnvelopeCreatedBody,
        EnvelopeView,
        SignEnvelopeBody,
        SignatureAcceptedBody,
        VerifyLinkBody,
        VerifiedLinkBody,
        SecurityFeatures,
        SecurityStatusBody,
        SendCodeBody,
        CodeSentBody,
        VerifyMfaBody,
        MfaVerifiedBody,
        ProvisionTotpBody,
        TotpProvisioningBody,
        MfaSessionStatus,
        PaymentStatusBody,
        WebhookAckBody,
    )),
    tags(
        (name = "envelopes", description = "Envelope intake and signing"),
        (name = "security", description = "Signed-link verification"),
        (name = "mfa", description = "One-time codes and authenticator apps"),
        (name = "payments", description = "Payment status and gateway webhooks"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
