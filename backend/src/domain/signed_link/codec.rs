//! Minting and verification of HMAC-protected, timestamped links.

use std::sync::Arc;

use chrono::TimeDelta;
use mockable::Clock;
use rand::RngCore;
use rand::rngs::OsRng;
use url::Url;

use super::canonical::{
    NONCE_PARAM, SIG_PARAM, TS_PARAM, canonical_query, encode_signed_fields, is_reserved,
};
use super::secret::SigningSecret;

/// Default validity of a signed link after its `ts`.
pub const LINK_TTL_MS: i64 = 300_000;
/// Default validity of a session token after issuance.
pub const SESSION_TOKEN_TTL_MS: i64 = 3_600_000;
const NONCE_BYTES: usize = 16;

/// Why a link or its parameters were rejected as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// The base URL could not be parsed as an absolute URL.
    InvalidBaseUrl,
    /// The base URL already carries a query component.
    BaseUrlHasQuery,
    /// A caller parameter uses a name owned by the codec.
    ReservedParameter,
    /// The same caller parameter name appears twice.
    DuplicateParameter,
    /// `ts`, `nonce`, or `sig` appears more than once.
    DuplicateSecurityParameter,
    /// `ts` is not a decimal millisecond timestamp.
    InvalidTimestamp,
}

impl MalformedReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidBaseUrl => "invalid base url",
            Self::BaseUrlHasQuery => "base url already has a query",
            Self::ReservedParameter => "reserved parameter name",
            Self::DuplicateParameter => "duplicate parameter name",
            Self::DuplicateSecurityParameter => "duplicate security parameter",
            Self::InvalidTimestamp => "invalid timestamp",
        }
    }
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged link failure. Callers must collapse every variant into one generic
/// denial at the trust boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// `sig`, `ts`, or `nonce` is absent.
    #[error("missing security parameters")]
    MissingSecurityParameters,
    /// The link is older than its time-to-live.
    #[error("link expired")]
    LinkExpired,
    /// The signature does not cover the presented parameters.
    #[error("invalid signature")]
    InvalidSignature,
    /// Input could not be interpreted.
    #[error("malformed input: {0}")]
    MalformedInput(MalformedReason),
    /// The nonce was already consumed by an earlier verification.
    #[error("link already used")]
    LinkReplayed,
}

impl LinkError {
    /// Stable tag recorded in security logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingSecurityParameters => "missing_security_parameters",
            Self::LinkExpired => "link_expired",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedInput(_) => "malformed_input",
            Self::LinkReplayed => "link_replayed",
        }
    }
}

/// Successfully verified link contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLink {
    /// Caller parameters in their original order.
    pub params: Vec<(String, String)>,
    /// Nonce carried by the link.
    pub nonce: String,
    /// Issue timestamp in epoch milliseconds.
    pub issued_at_ms: i64,
}

impl VerifiedLink {
    /// First value for the named caller parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Time-to-live settings for links and session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCodecConfig {
    /// Link validity in milliseconds.
    pub link_ttl_ms: i64,
    /// Session token validity in milliseconds.
    pub session_ttl_ms: i64,
}

impl Default for LinkCodecConfig {
    fn default() -> Self {
        Self {
            link_ttl_ms: LINK_TTL_MS,
            session_ttl_ms: SESSION_TOKEN_TTL_MS,
        }
    }
}

/// Signed-link codec bound to one secret and clock.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use envelope_backend::domain::signed_link::{LinkCodec, LinkCodecConfig, SigningSecret};
/// use mockable::DefaultClock;
///
/// let secret = SigningSecret::new(b"s".to_vec()).expect("secret");
/// let codec = LinkCodec::new(secret, Arc::new(DefaultClock), LinkCodecConfig::default());
/// let params = vec![("envelope".to_owned(), "e1".to_owned())];
/// let url = codec.mint("https://sign.example/sign.html", &params).expect("mint");
/// let presented: Vec<(String, String)> = url.query_pairs().into_owned().collect();
/// let verified = codec.verify(&presented).expect("fresh link verifies");
/// assert_eq!(verified.params, params);
/// ```
#[derive(Clone)]
pub struct LinkCodec {
    secret: SigningSecret,
    clock: Arc<dyn Clock>,
    config: LinkCodecConfig,
}

impl LinkCodec {
    /// Construct a codec from an injected secret and clock.
    pub fn new(secret: SigningSecret, clock: Arc<dyn Clock>, config: LinkCodecConfig) -> Self {
        Self {
            secret,
            clock,
            config,
        }
    }

    /// Configured link lifetime.
    #[must_use]
    pub fn link_ttl(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.config.link_ttl_ms)
    }

    pub(super) fn now_ms(&self) -> i64 {
        self.clock.utc().timestamp_millis()
    }

    pub(super) const fn config(&self) -> LinkCodecConfig {
        self.config
    }

    pub(super) const fn secret(&self) -> &SigningSecret {
        &self.secret
    }

    /// Append `params`, `ts`, and `nonce` to `base_url` and sign the result.
    ///
    /// The signature covers the full `?...` query in insertion order and is
    /// appended last as `sig`.
    pub fn mint(&self, base_url: &str, params: &[(String, String)]) -> Result<Url, LinkError> {
        let mut url = Url::parse(base_url)
            .map_err(|_| LinkError::MalformedInput(MalformedReason::InvalidBaseUrl))?;
        if url.query().is_some() {
            return Err(LinkError::MalformedInput(MalformedReason::BaseUrlHasQuery));
        }
        check_caller_params(params)?;

        let ts = self.now_ms().to_string();
        let nonce = generate_nonce();
        let signature = self
            .secret
            .sign_hex(canonical_query(params, &ts, &nonce).as_bytes());
        let fields = encode_signed_fields(params, &ts, &nonce);
        url.set_query(Some(&format!("{fields}&{SIG_PARAM}={signature}")));
        Ok(url)
    }

    /// Verify presented parameters and return the caller parameters.
    ///
    /// Checks run in a fixed order: presence, signature over the exact `ts`
    /// text received, timestamp syntax, then age. Replay is not checked here.
    pub fn verify(&self, presented: &[(String, String)]) -> Result<VerifiedLink, LinkError> {
        let fields = SecurityFields::extract(presented)?;
        let canonical = canonical_query(&fields.params, fields.ts, fields.nonce);
        if !self.secret.verify_hex(canonical.as_bytes(), fields.sig) {
            return Err(LinkError::InvalidSignature);
        }

        let issued_at_ms: i64 = fields
            .ts
            .parse()
            .map_err(|_| LinkError::MalformedInput(MalformedReason::InvalidTimestamp))?;
        if self.now_ms().saturating_sub(issued_at_ms) > self.config.link_ttl_ms {
            return Err(LinkError::LinkExpired);
        }

        Ok(VerifiedLink {
            nonce: fields.nonce.to_owned(),
            params: fields.params,
            issued_at_ms,
        })
    }
}

struct SecurityFields<'a> {
    params: Vec<(String, String)>,
    ts: &'a str,
    nonce: &'a str,
    sig: &'a str,
}

impl<'a> SecurityFields<'a> {
    fn extract(presented: &'a [(String, String)]) -> Result<Self, LinkError> {
        let mut ts = None;
        let mut nonce = None;
        let mut sig = None;
        let mut params = Vec::with_capacity(presented.len());

        for (name, value) in presented {
            let slot = match name.as_str() {
                TS_PARAM => &mut ts,
                NONCE_PARAM => &mut nonce,
                SIG_PARAM => &mut sig,
                _ => {
                    params.push((name.clone(), value.clone()));
                    continue;
                }
            };
            if slot.replace(value.as_str()).is_some() {
                return Err(LinkError::MalformedInput(
                    MalformedReason::DuplicateSecurityParameter,
                ));
            }
        }

        match (ts, nonce, sig) {
            (Some(ts), Some(nonce), Some(sig)) => Ok(Self {
                params,
                ts,
                nonce,
                sig,
            }),
            _ => Err(LinkError::MissingSecurityParameters),
        }
    }
}

fn check_caller_params(params: &[(String, String)]) -> Result<(), LinkError> {
    for (index, (name, _)) in params.iter().enumerate() {
        if is_reserved(name) {
            return Err(LinkError::MalformedInput(MalformedReason::ReservedParameter));
        }
        let seen_before = params
            .iter()
            .take(index)
            .any(|(earlier, _)| earlier == name);
        if seen_before {
            return Err(LinkError::MalformedInput(MalformedReason::DuplicateParameter));
        }
    }
    Ok(())
}

fn generate_nonce() -> String {
    let mut bytes = [0_u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
