//! Payment status and gateway webhook handlers.
//!
//! ```text
//! GET  /api/payments/status/{envelopeId}
//! POST /api/payments/webhook
//! ```

use actix_web::{HttpRequest, get, post, web};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::envelope::{EnvelopeStatus, PaymentStatus, SigningStatus};
use crate::domain::payment::GatewayEvent;
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelopes::parse_envelope_id;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::webhook_signature::SIGNATURE_HEADER;

/// Payment and signing progress of one envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusBody {
    #[schema(format = "uuid")]
    pub envelope_id: String,
    pub payment_status: Option<PaymentStatus>,
    pub signing_status: SigningStatus,
    pub status: EnvelopeStatus,
}

/// Gateway acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAckBody {
    pub received: bool,
}

/// Report an envelope's payment status.
#[utoipa::path(
    get,
    path = "/api/payments/status/{envelopeId}",
    params(("envelopeId" = String, Path, description = "Envelope id", format = "uuid")),
    responses(
        (status = 200, description = "Payment status", body = PaymentStatusBody),
        (status = 400, description = "Invalid id", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["payments"],
    operation_id = "paymentStatus",
    security([])
)]
#[get("/payments/status/{envelope_id}")]
pub async fn payment_status(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<PaymentStatusBody>> {
    let envelope_id = parse_envelope_id(&path.into_inner())?;
    let envelope = state.envelopes_query.get(&envelope_id).await?;
    Ok(web::Json(PaymentStatusBody {
        envelope_id: envelope.id().to_string(),
        payment_status: envelope.payment_status(),
        signing_status: envelope.signing_status(),
        status: envelope.status(),
    }))
}

/// Receive a payment gateway event.
///
/// The raw body is read so the gateway signature can be checked over the
/// exact bytes sent.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    params(("Stripe-Signature" = Option<String>, Header, description = "`t=<unix secs>,v1=<hex>`")),
    request_body(content = Object, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAckBody),
        (status = 400, description = "Bad signature or body", body = Error),
        (status = 503, description = "Retry later", body = Error)
    ),
    tags = ["payments"],
    operation_id = "paymentWebhook",
    security([])
)]
#[post("/payments/webhook")]
pub async fn payment_webhook(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Bytes,
) -> ApiResult<web::Json<WebhookAckBody>> {
    if let Some(verifier) = &state.policy.webhook {
        let header = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        verifier
            .verify(header, &body, state.clock.utc())
            .map_err(|reason| {
                warn!(reason = ?reason, "rejected gateway webhook signature");
                Error::invalid_request("webhook signature verification failed")
            })?;
    }

    let event = GatewayEvent::from_slice(&body).map_err(|err| {
        warn!(error = %err, "rejected malformed gateway webhook");
        Error::invalid_request(format!("invalid webhook payload: {err}"))
    })?;
    let event_id = event.id.clone();
    let outcome = state.payments.handle_event(event).await?;
    debug!(event_id = %event_id, outcome = outcome.label(), "gateway event handled");
    Ok(web::Json(WebhookAckBody { received: true }))
}

#[cfg(test)]
#[path = "payments_tests.rs"]
mod tests;
