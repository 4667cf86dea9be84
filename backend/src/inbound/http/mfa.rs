//! MFA HTTP handlers.
//!
//! ```text
//! POST /api/security/mfa/send
//! POST /api/security/mfa/verify
//! POST /api/security/mfa/provision
//! GET  /api/security/mfa/status
//! ```
//!
//! A successful verification is remembered in the cookie session; see
//! [`SessionContext`].

use actix_web::{HttpRequest, get, post, web};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::one_time_code::{DeliveryMethod, MfaMethod};
use crate::domain::ports::{
    MfaChallenge, ProvisionTotpRequest, SendCodeRequest, TotpProvisioning, VerifyMfaRequest,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::client::client_context;
use crate::inbound::http::session::{MfaSessionStatus, SessionContext};
use crate::inbound::http::state::HttpState;

/// Request to issue a channel code.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeBody {
    pub user_id: Option<String>,
    /// Email address or phone number.
    pub target: String,
    pub method: DeliveryMethod,
}

/// Acknowledgement of an issued code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeSentBody {
    pub message: String,
    pub method: DeliveryMethod,
    pub expires_at: DateTime<Utc>,
}

/// A factor submitted for verification.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyMfaBody {
    /// Required for `email` and `sms`.
    pub target: Option<String>,
    pub code: String,
    pub method: MfaMethod,
    /// Required for `totp`.
    pub user_id: Option<String>,
}

/// Successful verification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MfaVerifiedBody {
    pub verified: bool,
    pub method: MfaMethod,
    pub user_id: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// Request to provision an authenticator app.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionTotpBody {
    pub user_id: String,
    /// Label shown in the authenticator app; defaults to the user id.
    pub account_name: Option<String>,
}

/// Provisioning details for an authenticator app.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotpProvisioningBody {
    /// Base32 secret.
    pub secret: String,
    #[schema(example = "otpauth://totp/Sirsi:ada%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=Sirsi")]
    pub provisioning_uri: String,
    pub enrolled: bool,
}

impl From<TotpProvisioning> for TotpProvisioningBody {
    fn from(value: TotpProvisioning) -> Self {
        Self {
            secret: value.secret,
            provisioning_uri: value.provisioning_uri,
            enrolled: value.enrolled,
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, Error> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| Error::invalid_request(format!("{field} is required")))
}

fn challenge_from(body: VerifyMfaBody) -> Result<MfaChallenge, Error> {
    let VerifyMfaBody {
        target,
        code,
        method,
        user_id,
    } = body;
    match method {
        MfaMethod::Email => Ok(MfaChallenge::Channel {
            target: required(target, "target")?,
            method: DeliveryMethod::Email,
            code,
        }),
        MfaMethod::Sms => Ok(MfaChallenge::Channel {
            target: required(target, "target")?,
            method: DeliveryMethod::Sms,
            code,
        }),
        MfaMethod::Totp => Ok(MfaChallenge::Totp {
            user_id: required(user_id, "userId")?,
            code,
        }),
    }
}

/// Issue a one-time code over email or SMS.
#[utoipa::path(
    post,
    path = "/api/security/mfa/send",
    request_body = SendCodeBody,
    responses(
        (status = 200, description = "Code issued", body = CodeSentBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 429, description = "Too many codes requested", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["mfa"],
    operation_id = "sendMfaCode",
    security([])
)]
#[post("/security/mfa/send")]
pub async fn send_code(
    state: web::Data<HttpState>,
    payload: web::Json<SendCodeBody>,
) -> ApiResult<web::Json<CodeSentBody>> {
    let SendCodeBody {
        user_id,
        target,
        method,
    } = payload.into_inner();
    let target = required(Some(target), "target")?;
    let issued = state
        .mfa
        .send_code(SendCodeRequest {
            user_id,
            target,
            method,
        })
        .await?;
    Ok(web::Json(CodeSentBody {
        message: format!("Code sent via {}", issued.method),
        method: issued.method,
        expires_at: issued.expires_at,
    }))
}

/// Verify a channel code or TOTP and remember the result in the session.
#[utoipa::path(
    post,
    path = "/api/security/mfa/verify",
    request_body = VerifyMfaBody,
    responses(
        (status = 200, description = "Factor verified", body = MfaVerifiedBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 403, description = "Verification failed", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["mfa"],
    operation_id = "verifyMfa",
    security([])
)]
#[post("/security/mfa/verify")]
pub async fn verify_mfa(
    state: web::Data<HttpState>,
    req: HttpRequest,
    session: SessionContext,
    payload: web::Json<VerifyMfaBody>,
) -> ApiResult<web::Json<MfaVerifiedBody>> {
    let challenge = challenge_from(payload.into_inner())?;
    let verified = state
        .mfa
        .verify(VerifyMfaRequest {
            challenge,
            client: client_context(&req),
        })
        .await?;
    session.record_mfa(&verified)?;
    Ok(web::Json(MfaVerifiedBody {
        verified: true,
        method: verified.method,
        user_id: verified.user_id,
        verified_at: verified.verified_at,
    }))
}

/// Return (or create) the TOTP secret for an identity.
#[utoipa::path(
    post,
    path = "/api/security/mfa/provision",
    request_body = ProvisionTotpBody,
    responses(
        (status = 200, description = "Provisioning details", body = TotpProvisioningBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["mfa"],
    operation_id = "provisionTotp",
    security([])
)]
#[post("/security/mfa/provision")]
pub async fn provision_totp(
    state: web::Data<HttpState>,
    payload: web::Json<ProvisionTotpBody>,
) -> ApiResult<web::Json<TotpProvisioningBody>> {
    let ProvisionTotpBody {
        user_id,
        account_name,
    } = payload.into_inner();
    let user_id = required(Some(user_id), "userId")?;
    let account_name = account_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user_id.clone());
    let provisioning = state
        .mfa
        .provision_totp(ProvisionTotpRequest {
            user_id,
            account_name,
        })
        .await?;
    Ok(web::Json(provisioning.into()))
}

/// Report whether the session holds a recent MFA verification.
#[utoipa::path(
    get,
    path = "/api/security/mfa/status",
    responses((status = 200, description = "Session MFA state", body = MfaSessionStatus)),
    tags = ["mfa"],
    operation_id = "mfaStatus",
    security([])
)]
#[get("/security/mfa/status")]
pub async fn mfa_status(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<MfaSessionStatus>> {
    let ttl = TimeDelta::seconds(state.policy.mfa_session_ttl_secs);
    let status = session.mfa_status(state.clock.utc(), ttl)?;
    Ok(web::Json(status))
}

#[cfg(test)]
#[path = "mfa_tests.rs"]
mod tests;
