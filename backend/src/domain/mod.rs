//! Domain primitives, aggregates, and services.
//!
//! Purpose: hold the transport-agnostic core of the signing workflow. Inbound
//! adapters call the driving ports in [`ports`]; outbound adapters implement
//! the driven ones.
//!
//! Public surface:
//! - Error / ErrorCode: error payload shared by every driving port.
//! - TraceId: request-scoped correlation identifier.
//! - signed_link: HMAC link codec, session tokens, and link verification.
//! - one_time_code: channel codes, TOTP, and the MFA service.
//! - envelope: the envelope aggregate and its lifecycle service.
//! - payment: gateway events and reconciliation.

mod client_context;
pub mod envelope;
pub mod error;
pub mod one_time_code;
pub mod payment;
pub mod ports;
pub mod signed_link;
mod trace_id;

pub use self::client_context::ClientContext;
pub use self::error::{Error, ErrorCode};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use envelope_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
