//! Signed-link codec: tamper-evident, time-limited query strings and the
//! session tokens issued once a link verifies.
//!
//! Public surface:
//! - [`SigningSecret`]: injected HMAC key.
//! - [`LinkCodec`]: `mint`, `verify`, `issue_session_token`,
//!   `verify_session_token`.
//! - [`canonical_query`]: the single canonicalisation routine.
//! - [`SignedLinkService`]: verification with nonce replay protection and
//!   security logging.

mod canonical;
mod codec;
mod secret;
mod service;
mod session_token;

pub use canonical::{
    NONCE_PARAM, RESERVED_PARAMS, SIG_PARAM, TS_PARAM, canonical_query, is_reserved, parse_query,
};
pub use codec::{
    LINK_TTL_MS, LinkCodec, LinkCodecConfig, LinkError, MalformedReason, SESSION_TOKEN_TTL_MS,
    VerifiedLink,
};
pub use secret::{SIGNING_SECRET_MIN_LEN, SigningSecret, SigningSecretError};
pub use service::{ENVELOPE_PARAM, PROJECT_PARAM, SIGNER_PARAM, SignedLinkService};
pub use session_token::{SessionToken, SessionTokenError};
