//! Cookie-session helpers for the MFA verification flag.
//!
//! Handlers deal in [`MfaSessionStatus`] rather than raw session keys.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::LocalBoxFuture;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::MfaVerified;

pub(crate) const MFA_VERIFIED_AT_KEY: &str = "mfa_verified_at";
pub(crate) const MFA_METHOD_KEY: &str = "mfa_method";
pub(crate) const MFA_USER_KEY: &str = "mfa_user";

/// Default lifetime of an MFA verification held in the session.
pub const MFA_SESSION_TTL_SECS: i64 = 3600;

/// MFA state derived from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MfaSessionStatus {
    /// Whether a verification younger than the TTL is present.
    pub verified: bool,
    /// Factor that was used.
    #[schema(example = "totp")]
    pub method: Option<String>,
    /// When verification happened.
    pub verified_at: Option<DateTime<Utc>>,
    /// When the verification stops counting.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Wrapper exposing MFA operations over the Actix session.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Wrap an Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Record a successful verification.
    pub fn record_mfa(&self, verified: &MfaVerified) -> Result<(), Error> {
        self.0.renew();
        self.insert(MFA_VERIFIED_AT_KEY, verified.verified_at.timestamp())?;
        self.insert(MFA_METHOD_KEY, verified.method.as_str())?;
        match &verified.user_id {
            Some(user) => self.insert(MFA_USER_KEY, user.as_str()),
            None => {
                self.0.remove(MFA_USER_KEY);
                Ok(())
            }
        }
    }

    /// MFA state as of `now`, given a verification lifetime.
    pub fn mfa_status(&self, now: DateTime<Utc>, ttl: TimeDelta) -> Result<MfaSessionStatus, Error> {
        let verified_at = self
            .get::<i64>(MFA_VERIFIED_AT_KEY)?
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        let Some(verified_at) = verified_at else {
            return Ok(MfaSessionStatus {
                verified: false,
                method: None,
                verified_at: None,
                expires_at: None,
            });
        };
        let expires_at = verified_at + ttl;
        Ok(MfaSessionStatus {
            verified: verified_at <= now && now < expires_at,
            method: self.get::<String>(MFA_METHOD_KEY)?,
            verified_at: Some(verified_at),
            expires_at: Some(expires_at),
        })
    }

    fn insert(&self, key: &str, value: impl Serialize) -> Result<(), Error> {
        self.0
            .insert(key, value)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.0.get::<T>(key) {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::warn!(key, %error, "discarding unreadable session value");
                Ok(None)
            }
        }
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}
