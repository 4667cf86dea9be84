//! Signed-link verification and security posture endpoints.
//!
//! ```text
//! POST /api/security/verify
//! GET  /api/security/status
//! ```

use actix_web::{HttpRequest, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::VerifyLinkRequest;
use crate::inbound::http::ApiResult;
use crate::inbound::http::client::client_context;
use crate::inbound::http::state::HttpState;

const SECURITY_VERSION: &str = "v2-hmac-signed";

/// Link presented for verification.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLinkBody {
    /// Raw query string of the signed link, with or without `?`.
    #[schema(example = "envelope=3fa85f64-5717-4562-b3fc-2c963f66afa6&ts=1768471200000&nonce=ab12&sig=9f2c")]
    pub query: String,
}

/// Verified link parameters and the session token that proves it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedLinkBody {
    pub valid: bool,
    /// Caller parameters without `ts`, `nonce` or `sig`.
    #[schema(value_type = Object)]
    pub params: serde_json::Map<String, serde_json::Value>,
    pub session_token: String,
    pub session_signature: String,
    /// Token expiry in epoch milliseconds.
    pub expires: i64,
}

/// Security features advertised to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFeatures {
    pub hmac_signing: bool,
    pub signed_redirects: bool,
    pub replay_protection: bool,
    pub origin_allow_list: bool,
    pub webhook_signatures: bool,
}

/// Security posture snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatusBody {
    #[schema(example = "v2-hmac-signed")]
    pub security_version: String,
    pub features: SecurityFeatures,
    /// Signed-link lifetime in milliseconds.
    pub token_validity_ms: i64,
    /// Server time in epoch milliseconds.
    pub timestamp: i64,
}

/// Verify a signed link once and issue a session token.
#[utoipa::path(
    post,
    path = "/api/security/verify",
    request_body = VerifyLinkBody,
    responses(
        (status = 200, description = "Link verified", body = VerifiedLinkBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 403, description = "Link rejected", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["security"],
    operation_id = "verifySignedLink",
    security([])
)]
#[post("/security/verify")]
pub async fn verify_link(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<VerifyLinkBody>,
) -> ApiResult<web::Json<VerifiedLinkBody>> {
    let VerifyLinkBody { query } = payload.into_inner();
    if query.trim().is_empty() {
        return Err(Error::invalid_request("query must not be empty"));
    }
    let verified = state
        .links
        .verify_link(VerifyLinkRequest {
            query,
            client: client_context(&req),
        })
        .await?;

    let params = verified
        .params
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect();
    Ok(web::Json(VerifiedLinkBody {
        valid: true,
        params,
        session_token: verified.session.token,
        session_signature: verified.session.signature,
        expires: verified.session.expires,
    }))
}

/// Report which security features are active.
#[utoipa::path(
    get,
    path = "/api/security/status",
    responses((status = 200, description = "Security posture", body = SecurityStatusBody)),
    tags = ["security"],
    operation_id = "securityStatus",
    security([])
)]
#[get("/security/status")]
pub async fn security_status(state: web::Data<HttpState>) -> web::Json<SecurityStatusBody> {
    let policy = &state.policy;
    web::Json(SecurityStatusBody {
        security_version: SECURITY_VERSION.to_owned(),
        features: SecurityFeatures {
            hmac_signing: true,
            signed_redirects: true,
            replay_protection: true,
            origin_allow_list: !policy.origins.is_open(),
            webhook_signatures: policy.webhook.is_some(),
        },
        token_validity_ms: policy.link_ttl_ms,
        timestamp: state.clock.utc().timestamp_millis(),
    })
}
