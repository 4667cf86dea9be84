//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 6 digits, 30 s step).

use std::fmt;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// Seconds per TOTP step.
pub const TOTP_STEP_SECS: i64 = 30;
/// Steps accepted either side of the current one.
pub const TOTP_SKEW_STEPS: i64 = 1;
const TOTP_DIGITS_MODULUS: u32 = 1_000_000;
const SECRET_BYTES: usize = 20;

/// Failures handling TOTP material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TotpError {
    /// The stored secret is not valid base32.
    #[error("TOTP secret is not valid base32")]
    InvalidSecret,
    /// The provisioning URI could not be built.
    #[error("failed to build provisioning URI: {message}")]
    ProvisioningUri { message: String },
}

/// Base32 (RFC 4648, unpadded) shared secret.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(String);

impl TotpSecret {
    /// Draw a fresh 160-bit secret.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE32_NOPAD.encode(&bytes))
    }

    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BASE32_NOPAD.encode(bytes))
    }

    /// Accept an existing base32 secret, tolerating padding and lower case.
    pub fn from_base32(encoded: &str) -> Result<Self, TotpError> {
        let canonical = encoded.trim().trim_end_matches('=').to_ascii_uppercase();
        BASE32_NOPAD
            .decode(canonical.as_bytes())
            .map_err(|_| TotpError::InvalidSecret)?;
        Ok(Self(canonical))
    }

    /// Base32 text as shown to authenticator apps.
    #[must_use]
    pub fn as_base32(&self) -> &str {
        &self.0
    }

    fn key(&self) -> Result<Vec<u8>, TotpError> {
        BASE32_NOPAD
            .decode(self.0.as_bytes())
            .map_err(|_| TotpError::InvalidSecret)
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret(..)")
    }
}

/// The six-digit code for an explicit step counter.
pub fn code_at_step(secret: &TotpSecret, step: u64) -> Result<String, TotpError> {
    let key = secret.key()?;
    let mut mac = HmacSha1::new_from_slice(&key).map_err(|_| TotpError::InvalidSecret)?;
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest.last().copied().unwrap_or_default() & 0x0f);
    let window: [u8; 4] = digest
        .get(offset..offset + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(TotpError::InvalidSecret)?;
    let binary = u32::from_be_bytes(window) & 0x7fff_ffff;
    Ok(format!("{:06}", binary % TOTP_DIGITS_MODULUS))
}

/// Step counter containing `now`, or `None` before the Unix epoch.
#[must_use]
pub fn step_at(now: DateTime<Utc>) -> Option<u64> {
    u64::try_from(now.timestamp().div_euclid(TOTP_STEP_SECS)).ok()
}

/// The step within `now ± 1` whose code equals `code`, if any.
pub fn matching_step(
    secret: &TotpSecret,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<u64>, TotpError> {
    let code = code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    let Some(current) = step_at(now) else {
        return Ok(None);
    };

    let mut matched = None;
    for skew in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
        let Some(step) = current.checked_add_signed(skew) else {
            continue;
        };
        let expected = code_at_step(secret, step)?;
        if bool::from(expected.as_bytes().ct_eq(code.as_bytes())) {
            matched = Some(step);
        }
    }
    Ok(matched)
}

/// Accept `code` if it matches the previous, current, or next step.
pub fn verify_totp(secret: &TotpSecret, code: &str, now: DateTime<Utc>) -> Result<bool, TotpError> {
    Ok(matching_step(secret, code, now)?.is_some())
}

/// `otpauth://totp/{issuer}:{account}?secret=...&issuer=...`
pub fn provisioning_uri(
    secret: &TotpSecret,
    issuer: &str,
    account: &str,
) -> Result<String, TotpError> {
    let mut uri = Url::parse("otpauth://totp/").map_err(|err| TotpError::ProvisioningUri {
        message: err.to_string(),
    })?;
    uri.set_path(&format!("{issuer}:{account}"));
    uri.query_pairs_mut()
        .append_pair("secret", secret.as_base32())
        .append_pair("issuer", issuer);
    Ok(uri.to_string())
}

#[cfg(test)]
#[path = "totp_tests.rs"]
mod tests;
