//! Payment gateway webhook signatures (`Stripe-Signature` scheme).
//!
//! The header carries `t=<unix seconds>` and one or more `v1=<hex>` entries.
//! A delivery is authentic when any `v1` equals
//! `HMAC_SHA256(secret, "{t}.{raw body}")` and `t` is within the tolerance of
//! the current time.

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::signed_link::SigningSecret;

/// Header name used by the gateway.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Default clock tolerance for signed deliveries.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WebhookSignatureError {
    /// No signature header was sent.
    #[error("missing signature header")]
    Missing,
    /// The header lacks a timestamp or any `v1` entry.
    #[error("malformed signature header")]
    Malformed,
    /// No `v1` entry matches the body.
    #[error("no matching signature")]
    Mismatch,
    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance")]
    Stale,
}

/// Verifies gateway deliveries against the shared endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SigningSecret,
    tolerance: TimeDelta,
}

impl WebhookVerifier {
    /// Build a verifier with the given tolerance.
    #[must_use]
    pub fn new(secret: SigningSecret, tolerance: TimeDelta) -> Self {
        Self { secret, tolerance }
    }

    /// Check `header` against `body` at `now`.
    pub fn verify(
        &self,
        header: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookSignatureError> {
        let header = header.ok_or(WebhookSignatureError::Missing)?;
        let parsed = ParsedHeader::parse(header)?;

        let mut signed = Vec::with_capacity(parsed.timestamp_raw.len() + 1 + body.len());
        signed.extend_from_slice(parsed.timestamp_raw.as_bytes());
        signed.push(b'.');
        signed.extend_from_slice(body);

        if !parsed
            .signatures
            .iter()
            .any(|candidate| self.secret.verify_hex(&signed, candidate))
        {
            return Err(WebhookSignatureError::Mismatch);
        }

        let age = (now.timestamp() - parsed.timestamp).abs();
        if age > self.tolerance.num_seconds() {
            return Err(WebhookSignatureError::Stale);
        }
        Ok(())
    }

    /// Produce a header value for `body` at `timestamp`. Used by tests and
    /// local tooling that replays gateway events.
    #[must_use]
    pub fn sign(&self, body: &[u8], timestamp: i64) -> String {
        let mut signed = format!("{timestamp}.").into_bytes();
        signed.extend_from_slice(body);
        format!("t={timestamp},v1={}", self.secret.sign_hex(&signed))
    }
}

struct ParsedHeader<'a> {
    timestamp_raw: &'a str,
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> ParsedHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, WebhookSignatureError> {
        let mut timestamp_raw = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp_raw = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let timestamp_raw = timestamp_raw.ok_or(WebhookSignatureError::Malformed)?;
        let timestamp = timestamp_raw
            .parse::<i64>()
            .map_err(|_| WebhookSignatureError::Malformed)?;
        if signatures.is_empty() {
            return Err(WebhookSignatureError::Malformed);
        }
        Ok(Self {
            timestamp_raw,
            timestamp,
            signatures,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    #[fixture]
    fn verifier() -> WebhookVerifier {
        let secret = SigningSecret::new(b"whsec_test_secret".to_vec()).expect("secret");
        WebhookVerifier::new(secret, TimeDelta::seconds(DEFAULT_TOLERANCE_SECS))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid instant")
    }

    #[rstest]
    fn accepts_fresh_signature(verifier: WebhookVerifier) {
        let header = verifier.sign(BODY, 1_700_000_000);
        assert_eq!(
            verifier.verify(Some(&header), BODY, at(1_700_000_100)),
            Ok(())
        );
    }

    #[rstest]
    fn accepts_any_matching_v1(verifier: WebhookVerifier) {
        let good = verifier.sign(BODY, 1_700_000_000);
        let v1 = good.split_once(",v1=").map(|(_, sig)| sig).expect("v1");
        let header = format!("t=1700000000,v1={},v1={v1},v0=legacy", "0".repeat(64));
        assert_eq!(verifier.verify(Some(&header), BODY, at(1_700_000_000)), Ok(()));
    }

    #[rstest]
    fn rejects_tampered_body(verifier: WebhookVerifier) {
        let header = verifier.sign(BODY, 1_700_000_000);
        let tampered = br#"{"id":"evt_2","type":"checkout.session.completed"}"#;
        assert_eq!(
            verifier.verify(Some(&header), tampered, at(1_700_000_000)),
            Err(WebhookSignatureError::Mismatch)
        );
    }

    #[rstest]
    fn rejects_shifted_timestamp(verifier: WebhookVerifier) {
        let header = verifier
            .sign(BODY, 1_700_000_000)
            .replacen("t=1700000000", "t=1700000001", 1);
        assert_eq!(
            verifier.verify(Some(&header), BODY, at(1_700_000_000)),
            Err(WebhookSignatureError::Mismatch)
        );
    }

    #[rstest]
    #[case(1_700_000_301)]
    #[case(1_699_999_699)]
    fn rejects_outside_tolerance(verifier: WebhookVerifier, #[case] now: i64) {
        let header = verifier.sign(BODY, 1_700_000_000);
        assert_eq!(
            verifier.verify(Some(&header), BODY, at(now)),
            Err(WebhookSignatureError::Stale)
        );
    }

    #[rstest]
    #[case(None, WebhookSignatureError::Missing)]
    #[case(Some("v1=abc"), WebhookSignatureError::Malformed)]
    #[case(Some("t=1700000000"), WebhookSignatureError::Malformed)]
    #[case(Some("t=soon,v1=abc"), WebhookSignatureError::Malformed)]
    fn rejects_bad_headers(
        verifier: WebhookVerifier,
        #[case] header: Option<&str>,
        #[case] expected: WebhookSignatureError,
    ) {
        assert_eq!(
            verifier.verify(header, BODY, at(1_700_000_000)),
            Err(expected)
        );
    }
}
