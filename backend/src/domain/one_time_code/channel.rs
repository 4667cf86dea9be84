//! Six-digit codes delivered over email or SMS.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

/// Default lifetime of an issued code.
pub const CHANNEL_CODE_TTL_MS: i64 = 300_000;
/// Number of digits in a channel code.
pub const CODE_DIGITS: usize = 6;

/// Delivery channel for a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// Email delivery.
    Email,
    /// SMS delivery.
    Sms,
}

impl DeliveryMethod {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }

    /// Canonical form of a delivery target for this channel.
    ///
    /// Emails are lower-cased; phone numbers keep only `+` and digits.
    #[must_use]
    pub fn normalise_target(self, raw: &str) -> String {
        match self {
            Self::Email => raw.trim().to_lowercase(),
            Self::Sms => raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect(),
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Factor used to satisfy an MFA challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MfaMethod {
    /// Code delivered by email.
    Email,
    /// Code delivered by SMS.
    Sms,
    /// Authenticator app code.
    Totp,
}

impl MfaMethod {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Totp => "totp",
        }
    }
}

impl From<DeliveryMethod> for MfaMethod {
    fn from(method: DeliveryMethod) -> Self {
        match method {
            DeliveryMethod::Email => Self::Email,
            DeliveryMethod::Sms => Self::Sms,
        }
    }
}

/// Unsupported delivery channel name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported delivery method: {0}")]
pub struct UnknownDeliveryMethod(pub String);

impl FromStr for DeliveryMethod {
    type Err = UnknownDeliveryMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            other => Err(UnknownDeliveryMethod(other.to_owned())),
        }
    }
}

/// A zero-padded six-digit code.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelCode(String);

impl ChannelCode {
    /// Draw a uniformly random code in `000000..=999999`.
    #[must_use]
    pub fn generate() -> Self {
        let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("{value:06}"))
    }

    /// Wrap an existing code string.
    #[must_use]
    pub fn from_string(code: String) -> Self {
        Self(code)
    }

    /// Code digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a submitted code.
    #[must_use]
    pub fn matches(&self, submitted: &str) -> bool {
        self.0.as_bytes().ct_eq(submitted.trim().as_bytes()).into()
    }
}

impl fmt::Debug for ChannelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelCode(******)")
    }
}

/// Stored record of an issued code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeCodeRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Identity the code was issued for, when known.
    pub user_id: Option<String>,
    /// Normalised email address or phone number.
    pub target: String,
    /// Delivery channel.
    pub method: DeliveryMethod,
    /// The code.
    pub code: ChannelCode,
    /// Instant after which the code is invalid.
    pub expires_at: DateTime<Utc>,
    /// Wrong guesses recorded so far.
    pub failed_attempts: u32,
}

impl OneTimeCodeRecord {
    /// Valid strictly before `expires_at`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
