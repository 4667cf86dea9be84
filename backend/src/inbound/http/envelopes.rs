//! Envelope HTTP handlers.
//!
//! ```text
//! POST /api/envelopes
//! POST /api/envelopes/{id}/sign
//! POST /api/guest/envelopes
//! GET  /api/guest/envelopes/{id}
//! POST /api/guest/envelopes/{id}/sign
//! ```
//!
//! Multi-signer intake needs an MFA-verified session. Signing outside the
//! guest routes needs the session token from link verification.

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::envelope::{
    Envelope, EnvelopeId, EnvelopeStatus, PaymentStatus, ProjectId, SigningStatus,
};
use crate::domain::ports::{
    CreateEnvelopeRequest, CreateGuestEnvelopeRequest, Recipient, SignEnvelopeRequest,
    SignatureAccepted,
};
use crate::domain::{Error, ErrorCode};
use crate::inbound::http::ApiResult;
use crate::inbound::http::client::client_context;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Header carrying the session token issued by `/api/security/verify`.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";
/// Header carrying the session token's signature.
pub const SESSION_SIGNATURE_HEADER: &str = "X-Session-Signature";

const SESSION_MISMATCH: &str = "session does not match envelope";
const SESSION_REQUIRED: &str = "session verification failed";
const SIGNER_MISMATCH: &str = "session does not match signer";
const NOT_GUEST: &str = "this envelope requires authentication";
const MFA_REQUIRED: &str = "MFA verification required";

/// One signer in an intake request.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipientBody {
    #[schema(format = "email")]
    pub email: String,
    pub name: Option<String>,
}

/// Request payload for a multi-signer envelope.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvelopeBody {
    #[serde(default)]
    #[schema(example = "partnership-agreement")]
    pub doc_type: String,
    #[serde(default)]
    pub recipients: Vec<RecipientBody>,
    #[schema(example = "sirsi")]
    pub project_id: Option<String>,
    pub callback_url: Option<String>,
    /// Whether signers may use the guest routes; defaults to `true`.
    pub guest_signing: Option<bool>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

/// Signed link for one signer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignerLinkBody {
    pub signer: String,
    pub signing_url: String,
}

/// Response payload for a created envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeCreatedBody {
    #[schema(format = "uuid")]
    pub envelope_id: String,
    pub status: EnvelopeStatus,
    pub signing_links: Vec<SignerLinkBody>,
}

/// Request payload for a guest envelope.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestEnvelopeBody {
    pub signer_name: String,
    #[schema(format = "email")]
    pub signer_email: String,
    #[schema(example = "legacy-msa")]
    pub doc_type: Option<String>,
    #[schema(example = "sirsi")]
    pub project_id: Option<String>,
    #[serde(alias = "plan")]
    pub selected_plan: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub amount: Option<Value>,
    pub callback_url: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

/// Response payload for a created guest envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestEnvelopeCreatedBody {
    #[schema(format = "uuid")]
    pub envelope_id: String,
    pub signing_url: String,
    pub status: EnvelopeStatus,
}

/// Read model of a guest envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeView {
    #[schema(format = "uuid")]
    pub id: String,
    pub doc_type: String,
    pub project_id: ProjectId,
    pub signers: Vec<String>,
    pub signing_status: SigningStatus,
    pub payment_status: Option<PaymentStatus>,
    pub status: EnvelopeStatus,
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
    pub signature_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Envelope> for EnvelopeView {
    fn from(envelope: &Envelope) -> Self {
        Self {
            id: envelope.id().to_string(),
            doc_type: envelope.doc_type().to_owned(),
            project_id: envelope.project(),
            signers: envelope.signers().iter().map(ToString::to_string).collect(),
            signing_status: envelope.signing_status(),
            payment_status: envelope.payment_status(),
            status: envelope.status(),
            metadata: envelope.metadata().clone(),
            signature_count: envelope.signatures().len(),
            created_at: envelope.created_at(),
            updated_at: envelope.updated_at(),
            completed_at: envelope.completed_at(),
        }
    }
}

/// Request payload for a signature.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignEnvelopeBody {
    #[schema(format = "email")]
    pub signer_email: Option<String>,
    pub signer_name: Option<String>,
    pub signature_data: Option<String>,
    pub signature_image: Option<String>,
}

/// Response payload for an accepted signature.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureAcceptedBody {
    pub status: SigningStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

pub(crate) fn parse_envelope_id(raw: &str) -> Result<EnvelopeId, Error> {
    raw.parse::<EnvelopeId>()
        .map_err(|err| Error::invalid_request(err.to_string()))
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Claims of a verified session token.
struct SessionClaims(Map<String, Value>);

impl SessionClaims {
    fn signer(&self) -> Option<&str> {
        self.0.get("signer").and_then(Value::as_str)
    }
}

/// When session headers are present they must verify and name this envelope.
async fn check_session_headers(
    state: &HttpState,
    req: &HttpRequest,
    envelope_id: &EnvelopeId,
) -> Result<Option<SessionClaims>, Error> {
    let token = header(req, SESSION_TOKEN_HEADER);
    let signature = header(req, SESSION_SIGNATURE_HEADER);
    let (token, signature) = match (token, signature) {
        (None, None) => return Ok(None),
        (Some(token), Some(signature)) => (token, signature),
        _ => return Err(Error::forbidden(SESSION_REQUIRED)),
    };
    let claims = state.links.verify_session(token, signature).await?;
    let expected = envelope_id.to_string();
    match claims.get("envelopeId").and_then(Value::as_str) {
        Some(claimed) if claimed == expected => Ok(Some(SessionClaims(claims))),
        _ => Err(Error::forbidden(SESSION_MISMATCH)),
    }
}

/// A session bound to a signer decides who is signing; a body naming
/// someone else is refused.
fn signer_for(
    requested: Option<String>,
    claims: Option<&SessionClaims>,
) -> Result<Option<String>, Error> {
    let Some(bound) = claims.and_then(SessionClaims::signer) else {
        return Ok(requested);
    };
    match requested {
        Some(email) if !email.trim().eq_ignore_ascii_case(bound) => {
            Err(Error::forbidden(SIGNER_MISMATCH))
        }
        _ => Ok(Some(bound.to_owned())),
    }
}

fn require_mfa(state: &HttpState, session: &SessionContext) -> Result<(), Error> {
    let ttl = TimeDelta::seconds(state.policy.mfa_session_ttl_secs);
    if session.mfa_status(state.clock.utc(), ttl)?.verified {
        Ok(())
    } else {
        Err(Error::unauthorized(MFA_REQUIRED))
    }
}

async fn record_signature(
    state: &HttpState,
    req: &HttpRequest,
    envelope_id: EnvelopeId,
    signer_email: Option<String>,
    body: SignEnvelopeBody,
) -> ApiResult<web::Json<SignatureAcceptedBody>> {
    let accepted = state
        .envelopes
        .sign(SignEnvelopeRequest {
            envelope_id,
            signer_email,
            signer_name: body.signer_name,
            signature_data: body.signature_data,
            signature_image: body.signature_image,
            client: client_context(req),
        })
        .await
        .map_err(|err| match err.code() {
            ErrorCode::NotFound => Error::not_found("envelope not found"),
            _ => err,
        })?;
    Ok(web::Json(accepted_body(accepted)))
}

fn accepted_body(accepted: SignatureAccepted) -> SignatureAcceptedBody {
    let message = if accepted.completed {
        "All signatures collected. Envelope completed."
    } else {
        "Signature recorded."
    };
    SignatureAcceptedBody {
        status: accepted.status,
        message: message.to_owned(),
        callback_url: accepted.callback_url,
    }
}

async fn load_guest_envelope(state: &HttpState, envelope_id: &EnvelopeId) -> ApiResult<Envelope> {
    let envelope = state.envelopes_query.get(envelope_id).await?;
    if envelope.is_guest() {
        Ok(envelope)
    } else {
        Err(Error::forbidden(NOT_GUEST))
    }
}

/// Create an envelope for one or more signers and mint a link for each.
#[utoipa::path(
    post,
    path = "/api/envelopes",
    request_body = CreateEnvelopeBody,
    responses(
        (status = 201, description = "Envelope created", body = EnvelopeCreatedBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "MFA verification required", body = Error),
        (status = 403, description = "Origin not allowed", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["envelopes"],
    operation_id = "createEnvelope",
    security(("SessionCookie" = []))
)]
#[post("/envelopes")]
pub async fn create_envelope(
    state: web::Data<HttpState>,
    req: HttpRequest,
    session: SessionContext,
    payload: web::Json<CreateEnvelopeBody>,
) -> ApiResult<HttpResponse> {
    state.policy.origins.check(&req)?;
    require_mfa(&state, &session)?;
    let body = payload.into_inner();
    let created = state
        .envelopes
        .create_envelope(CreateEnvelopeRequest {
            doc_type: body.doc_type,
            recipients: body
                .recipients
                .into_iter()
                .map(|recipient| Recipient {
                    email: recipient.email,
                    name: recipient.name,
                })
                .collect(),
            project_id: body.project_id,
            metadata: body.metadata,
            callback_url: body.callback_url,
            guest: body.guest_signing.unwrap_or(true),
        })
        .await?;

    Ok(HttpResponse::Created().json(EnvelopeCreatedBody {
        envelope_id: created.envelope_id.to_string(),
        status: created.status,
        signing_links: created
            .signing_links
            .into_iter()
            .map(|link| SignerLinkBody {
                signer: link.signer,
                signing_url: link.signing_url,
            })
            .collect(),
    }))
}

/// Record a signature bound to a verified link session.
#[utoipa::path(
    post,
    path = "/api/envelopes/{id}/sign",
    params(
        ("id" = String, Path, description = "Envelope id", format = "uuid"),
        ("X-Session-Token" = String, Header, description = "Token from link verification"),
        ("X-Session-Signature" = String, Header, description = "Signature of the token")
    ),
    request_body = SignEnvelopeBody,
    responses(
        (status = 200, description = "Signature recorded", body = SignatureAcceptedBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 403, description = "Session missing or not for this signer", body = Error),
        (status = 404, description = "Not found", body = Error),
        (status = 409, description = "Already signed or completed", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["envelopes"],
    operation_id = "signEnvelope",
    security([])
)]
#[post("/envelopes/{id}/sign")]
pub async fn sign_envelope(
    state: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<SignEnvelopeBody>,
) -> ApiResult<web::Json<SignatureAcceptedBody>> {
    state.policy.origins.check(&req)?;
    let envelope_id = parse_envelope_id(&path.into_inner())?;
    let claims = check_session_headers(&state, &req, &envelope_id)
        .await?
        .filter(|claims| claims.signer().is_some())
        .ok_or_else(|| Error::forbidden(SESSION_REQUIRED))?;

    let body = payload.into_inner();
    let signer = signer_for(body.signer_email.clone(), Some(&claims))?;
    record_signature(&state, &req, envelope_id, signer, body).await
}

/// Create a guest envelope and mint its signing link.
#[utoipa::path(
    post,
    path = "/api/guest/envelopes",
    request_body = CreateGuestEnvelopeBody,
    responses(
        (status = 201, description = "Envelope created", body = GuestEnvelopeCreatedBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 403, description = "Origin not allowed", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["envelopes"],
    operation_id = "createGuestEnvelope",
    security([])
)]
#[post("/guest/envelopes")]
pub async fn create_guest_envelope(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<CreateGuestEnvelopeBody>,
) -> ApiResult<HttpResponse> {
    state.policy.origins.check(&req)?;
    let body = payload.into_inner();
    let created = state
        .envelopes
        .create_guest_envelope(CreateGuestEnvelopeRequest {
            signer_name: body.signer_name,
            signer_email: body.signer_email,
            doc_type: body.doc_type,
            project_id: body.project_id,
            selected_plan: body.selected_plan,
            amount: body.amount,
            callback_url: body.callback_url,
            metadata: body.metadata,
        })
        .await?;

    Ok(HttpResponse::Created().json(GuestEnvelopeCreatedBody {
        envelope_id: created.envelope_id.to_string(),
        signing_url: created.signing_url,
        status: created.status,
    }))
}

/// Fetch a guest envelope.
#[utoipa::path(
    get,
    path = "/api/guest/envelopes/{id}",
    params(("id" = String, Path, description = "Envelope id", format = "uuid")),
    responses(
        (status = 200, description = "Envelope", body = EnvelopeView),
        (status = 400, description = "Invalid id", body = Error),
        (status = 403, description = "Not a guest envelope", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["envelopes"],
    operation_id = "getGuestEnvelope",
    security([])
)]
#[get("/guest/envelopes/{id}")]
pub async fn get_guest_envelope(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<EnvelopeView>> {
    let envelope_id = parse_envelope_id(&path.into_inner())?;
    let envelope = load_guest_envelope(&state, &envelope_id).await?;
    Ok(web::Json(EnvelopeView::from(&envelope)))
}

/// Record a guest signature.
#[utoipa::path(
    post,
    path = "/api/guest/envelopes/{id}/sign",
    params(
        ("id" = String, Path, description = "Envelope id", format = "uuid"),
        ("X-Session-Token" = Option<String>, Header, description = "Token from link verification"),
        ("X-Session-Signature" = Option<String>, Header, description = "Signature of the token")
    ),
    request_body = SignEnvelopeBody,
    responses(
        (status = 200, description = "Signature recorded", body = SignatureAcceptedBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 403, description = "Not allowed to sign", body = Error),
        (status = 404, description = "Not found", body = Error),
        (status = 409, description = "Already signed or completed", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["envelopes"],
    operation_id = "signGuestEnvelope",
    security([])
)]
#[post("/guest/envelopes/{id}/sign")]
pub async fn sign_guest_envelope(
    state: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<SignEnvelopeBody>,
) -> ApiResult<web::Json<SignatureAcceptedBody>> {
    state.policy.origins.check(&req)?;
    let envelope_id = parse_envelope_id(&path.into_inner())?;
    let claims = check_session_headers(&state, &req, &envelope_id).await?;
    load_guest_envelope(&state, &envelope_id).await?;

    let body = payload.into_inner();
    let signer = signer_for(body.signer_email.clone(), claims.as_ref())?;
    record_signature(&state, &req, envelope_id, signer, body).await
}

#[cfg(test)]
#[path = "envelopes_tests.rs"]
mod tests;
