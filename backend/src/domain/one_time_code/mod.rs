//! One-time verification codes: channel codes (email/SMS) and TOTP.

mod channel;
mod service;
mod totp;

pub use channel::{
    CHANNEL_CODE_TTL_MS, CODE_DIGITS, ChannelCode, DeliveryMethod, MfaMethod, OneTimeCodeRecord,
    UnknownDeliveryMethod,
};
pub use service::{MfaConfig, MfaPorts, MfaService};
pub use totp::{
    TOTP_SKEW_STEPS, TOTP_STEP_SECS, TotpError, TotpSecret, code_at_step, matching_step,
    provisioning_uri, step_at, verify_totp,
};
