//! Shared HMAC secret used by the link codec and session tokens.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Minimum secret length accepted outside development builds.
pub const SIGNING_SECRET_MIN_LEN: usize = 32;

/// Errors raised while constructing a [`SigningSecret`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningSecretError {
    /// The secret material is empty.
    #[error("signing secret must not be empty")]
    Empty,
    /// The HMAC implementation rejected the key.
    #[error("signing secret rejected by HMAC: {message}")]
    Rejected { message: String },
}

/// Process-wide signing secret, loaded once and injected at construction.
///
/// The raw bytes are only held long enough to key the MAC and are zeroized
/// afterwards; the keyed state is cloned for every signature.
#[derive(Clone)]
pub struct SigningSecret {
    keyed: HmacSha256,
}

impl SigningSecret {
    /// Key a new secret from raw bytes.
    ///
    /// # Examples
    /// ```
    /// use envelope_backend::domain::signed_link::SigningSecret;
    ///
    /// let secret = SigningSecret::new(b"s".to_vec()).expect("non-empty secret");
    /// assert_eq!(secret.sign_hex(b"payload").len(), 64);
    /// ```
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SigningSecretError> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.is_empty() {
            return Err(SigningSecretError::Empty);
        }
        let keyed = HmacSha256::new_from_slice(&bytes).map_err(|err| {
            SigningSecretError::Rejected {
                message: err.to_string(),
            }
        })?;
        Ok(Self { keyed })
    }

    /// Start a MAC computation keyed with this secret.
    pub(crate) fn mac(&self) -> HmacSha256 {
        self.keyed.clone()
    }

    /// Hex-encoded HMAC-SHA256 of `message`.
    #[must_use]
    pub fn sign_hex(&self, message: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a hex signature in constant time. Non-hex input never matches.
    #[must_use]
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(message);
        mac.verify_slice(&signature).is_ok()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn rejects_empty_secret() {
        assert_eq!(
            SigningSecret::new(Vec::new()).map(|_| ()),
            Err(SigningSecretError::Empty)
        );
    }

    #[rstest]
    fn matches_known_hmac_vector() {
        // RFC 4231 test case 2.
        let secret = SigningSecret::new(b"Jefe".to_vec()).expect("secret");
        assert_eq!(
            secret.sign_hex(b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[rstest]
    #[case("zz")]
    #[case("")]
    #[case("abc")]
    fn non_hex_or_short_signatures_fail(#[case] signature: &str) {
        let secret = SigningSecret::new(b"s".to_vec()).expect("secret");
        assert!(!secret.verify_hex(b"payload", signature));
    }

    #[rstest]
    fn debug_output_hides_material() {
        let secret = SigningSecret::new(b"very-secret".to_vec()).expect("secret");
        assert_eq!(format!("{secret:?}"), "SigningSecret(..)");
    }
}
