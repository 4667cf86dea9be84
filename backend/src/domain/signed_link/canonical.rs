//! Canonical query-string construction shared by minting and verification.
//!
//! Both directions must produce byte-identical input for the MAC, so this is
//! the only place that encodes link parameters.

use url::form_urlencoded;

/// Name of the issue timestamp parameter (decimal epoch milliseconds).
pub const TS_PARAM: &str = "ts";
/// Name of the random nonce parameter (hex).
pub const NONCE_PARAM: &str = "nonce";
/// Name of the signature parameter (hex HMAC-SHA256).
pub const SIG_PARAM: &str = "sig";

/// Parameter names the codec owns; callers may not supply them.
pub const RESERVED_PARAMS: [&str; 3] = [TS_PARAM, NONCE_PARAM, SIG_PARAM];

/// Returns `true` when `name` is one of the codec's own parameters.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name)
}

/// Encode caller parameters followed by `ts` and `nonce`, without the leading `?`.
pub(crate) fn encode_signed_fields(params: &[(String, String)], ts: &str, nonce: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        serializer.append_pair(name, value);
    }
    serializer.append_pair(TS_PARAM, ts);
    serializer.append_pair(NONCE_PARAM, nonce);
    serializer.finish()
}

/// The exact byte sequence covered by the link signature: the full query
/// component, `?` included, in insertion order.
///
/// # Examples
/// ```
/// use envelope_backend::domain::signed_link::canonical_query;
///
/// let params = vec![("signer".to_owned(), "a@x.com".to_owned())];
/// assert_eq!(
///     canonical_query(&params, "1700000000000", "ab"),
///     "?signer=a%40x.com&ts=1700000000000&nonce=ab"
/// );
/// ```
#[must_use]
pub fn canonical_query(params: &[(String, String)], ts: &str, nonce: &str) -> String {
    format!("?{}", encode_signed_fields(params, ts, nonce))
}

/// Split a raw query string (with or without the leading `?`) into ordered,
/// percent-decoded pairs.
#[must_use]
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    let trimmed = raw.strip_prefix('?').unwrap_or(raw);
    form_urlencoded::parse(trimmed.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn preserves_insertion_order() {
        let forward = canonical_query(&pairs(&[("a", "1"), ("b", "2")]), "5", "n");
        let reversed = canonical_query(&pairs(&[("b", "2"), ("a", "1")]), "5", "n");
        assert_eq!(forward, "?a=1&b=2&ts=5&nonce=n");
        assert_eq!(reversed, "?b=2&a=1&ts=5&nonce=n");
    }

    #[rstest]
    fn encodes_like_form_data() {
        let query = canonical_query(&pairs(&[("plan", "Gold Plan"), ("amount", "1&2")]), "1", "n");
        assert_eq!(query, "?plan=Gold+Plan&amount=1%262&ts=1&nonce=n");
    }

    #[rstest]
    #[case("?a=1&b=x%40y", &[("a", "1"), ("b", "x@y")])]
    #[case("a=1&b=x+y", &[("a", "1"), ("b", "x y")])]
    #[case("", &[])]
    fn parses_raw_queries(#[case] raw: &str, #[case] expected: &[(&str, &str)]) {
        assert_eq!(parse_query(raw), pairs(expected));
    }

    #[rstest]
    fn decoded_pairs_reencode_to_the_same_bytes() {
        let original = pairs(&[("signer", "a+b@x.com"), ("plan", "Tier 1/2")]);
        let encoded = canonical_query(&original, "7", "ff");
        let decoded = parse_query(&encoded);
        let (params, rest) = decoded.split_at(2);
        assert_eq!(params, original.as_slice());
        assert_eq!(rest, pairs(&[("ts", "7"), ("nonce", "ff")]).as_slice());
        assert_eq!(canonical_query(params, "7", "ff"), encoded);
    }
}
