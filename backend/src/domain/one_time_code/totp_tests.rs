//! Regression coverage for this module.

use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn rfc_secret() -> TotpSecret {
    TotpSecret::from_bytes(b"12345678901234567890")
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .expect("fixture timestamp is valid")
}

#[rstest]
#[case(59, "287082")]
#[case(1_111_111_109, "081804")]
#[case(1_234_567_890, "005924")]
#[case(2_000_000_000, "279037")]
fn matches_rfc_6238_sha1_vectors(rfc_secret: TotpSecret, #[case] secs: i64, #[case] code: &str) {
    let step = step_at(at(secs)).expect("post-epoch step");
    assert_eq!(code_at_step(&rfc_secret, step).expect("code"), code);
    assert!(verify_totp(&rfc_secret, code, at(secs)).expect("verify"));
}

#[rstest]
#[case(-30, true)]
#[case(30, true)]
#[case(-60, false)]
#[case(60, false)]
fn accepts_one_step_of_skew(rfc_secret: TotpSecret, #[case] offset: i64, #[case] accepted: bool) {
    let now = at(1_234_567_890);
    let step = step_at(now + chrono::TimeDelta::seconds(offset)).expect("step");
    let code = code_at_step(&rfc_secret, step).expect("code");
    assert_eq!(
        verify_totp(&rfc_secret, &code, now).expect("verify"),
        accepted
    );
}

#[rstest]
#[case("")]
#[case("12345")]
#[case("1234567")]
#[case("abcdef")]
fn rejects_malformed_codes(rfc_secret: TotpSecret, #[case] code: &str) {
    assert_eq!(
        matching_step(&rfc_secret, code, at(59)).expect("verify"),
        None
    );
}

#[rstest]
fn reports_the_matching_step(rfc_secret: TotpSecret) {
    let now = at(1_111_111_109);
    let previous = step_at(now).expect("step") - 1;
    let code = code_at_step(&rfc_secret, previous).expect("code");
    assert_eq!(
        matching_step(&rfc_secret, &code, now).expect("verify"),
        Some(previous)
    );
}

#[rstest]
fn generated_secrets_decode_to_twenty_bytes() {
    let secret = TotpSecret::generate();
    let decoded = BASE32_NOPAD
        .decode(secret.as_base32().as_bytes())
        .expect("valid base32");
    assert_eq!(decoded.len(), 20);
    assert_ne!(secret, TotpSecret::generate());
}

#[rstest]
#[case("gezdgnbvgy3tqojqgezdgnbvgy3tqojq")]
#[case("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ")]
fn parses_base32_case_insensitively(#[case] encoded: &str) {
    let secret = TotpSecret::from_base32(encoded).expect("valid secret");
    assert_eq!(secret, TotpSecret::from_bytes(b"12345678901234567890"));
}

#[rstest]
fn rejects_invalid_base32() {
    assert_eq!(
        TotpSecret::from_base32("not base32!"),
        Err(TotpError::InvalidSecret)
    );
}

#[rstest]
fn provisioning_uri_carries_secret_and_issuer(rfc_secret: TotpSecret) {
    let uri = provisioning_uri(&rfc_secret, "Sirsi", "ada@example.com").expect("uri");
    let parsed = Url::parse(&uri).expect("valid url");
    assert_eq!(parsed.scheme(), "otpauth");
    assert_eq!(parsed.host_str(), Some("totp"));
    assert!(parsed.path().starts_with("/Sirsi:ada"));
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![
            ("secret".to_owned(), rfc_secret.as_base32().to_owned()),
            ("issuer".to_owned(), "Sirsi".to_owned()),
        ]
    );
}

#[rstest]
fn debug_hides_secret(rfc_secret: TotpSecret) {
    assert_eq!(format!("{rfc_secret:?}"), "TotpSecret(..)");
}
