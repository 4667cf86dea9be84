//! Short-lived bearer tokens issued after a signed link verifies.
//!
//! The token is `base64(json)` and the signature is an HMAC over the JSON
//! text itself, not over the base64 form.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value};

use super::codec::LinkCodec;

const EXPIRES_CLAIM: &str = "expires";

/// Issued session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Base64 of the serialised claims.
    pub token: String,
    /// Hex HMAC-SHA256 over the serialised claims.
    pub signature: String,
    /// Expiry instant in epoch milliseconds.
    pub expires: i64,
}

/// Failures when issuing or checking a session token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionTokenError {
    /// Claims must serialise to a JSON object.
    #[error("session claims must be a JSON object")]
    ClaimsNotAnObject,
    /// Claims could not be serialised.
    #[error("failed to serialise session claims: {message}")]
    Serialize { message: String },
    /// Token is not base64 JSON carrying a numeric `expires`.
    #[error("malformed session token")]
    Malformed,
    /// Signature does not match the token payload.
    #[error("invalid session token signature")]
    InvalidSignature,
    /// Token is past its `expires` instant.
    #[error("session token expired")]
    Expired,
}

impl LinkCodec {
    /// Issue a token over `claims` plus an `expires` claim.
    ///
    /// An `expires` key inside `claims` is overwritten.
    pub fn issue_session_token<C: Serialize>(
        &self,
        claims: &C,
    ) -> Result<SessionToken, SessionTokenError> {
        let value = serde_json::to_value(claims).map_err(|err| SessionTokenError::Serialize {
            message: err.to_string(),
        })?;
        let Value::Object(mut payload) = value else {
            return Err(SessionTokenError::ClaimsNotAnObject);
        };

        let expires = self.now_ms().saturating_add(self.config().session_ttl_ms);
        payload.insert(EXPIRES_CLAIM.to_owned(), Value::from(expires));
        let serialised =
            serde_json::to_string(&payload).map_err(|err| SessionTokenError::Serialize {
                message: err.to_string(),
            })?;

        Ok(SessionToken {
            token: STANDARD.encode(serialised.as_bytes()),
            signature: self.secret().sign_hex(serialised.as_bytes()),
            expires,
        })
    }

    /// Check a token and signature pair, returning the claims on success.
    pub fn verify_session_token(
        &self,
        token: &str,
        signature: &str,
    ) -> Result<Map<String, Value>, SessionTokenError> {
        let serialised = STANDARD
            .decode(token.as_bytes())
            .map_err(|_| SessionTokenError::Malformed)?;
        if !self.secret().verify_hex(&serialised, signature) {
            return Err(SessionTokenError::InvalidSignature);
        }

        let claims: Map<String, Value> =
            serde_json::from_slice(&serialised).map_err(|_| SessionTokenError::Malformed)?;
        let expires = claims
            .get(EXPIRES_CLAIM)
            .and_then(Value::as_i64)
            .ok_or(SessionTokenError::Malformed)?;
        if self.now_ms() >= expires {
            return Err(SessionTokenError::Expired);
        }
        Ok(claims)
    }
}
