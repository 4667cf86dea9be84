//! HTTP inbound adapter exposing REST endpoints.

use actix_web::web;

pub mod client;
pub mod envelopes;
pub mod error;
pub mod health;
pub mod mfa;
pub mod origin;
pub mod payments;
pub mod security;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod webhook_signature;

pub use error::ApiResult;

/// Largest JSON body accepted; signature images arrive as data URLs.
pub const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Register every `/api` handler and extractor configuration.
///
/// Mount inside a scope carrying the session middleware:
///
/// ```ignore
/// App::new().service(web::scope("/api").wrap(session).configure(configure_api))
/// ```
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(error::json_error_handler),
    )
    .app_data(web::PathConfig::default().error_handler(error::path_error_handler))
    .app_data(web::PayloadConfig::new(JSON_BODY_LIMIT))
    .service(envelopes::create_envelope)
    .service(envelopes::sign_envelope)
    .service(envelopes::create_guest_envelope)
    .service(envelopes::get_guest_envelope)
    .service(envelopes::sign_guest_envelope)
    .service(security::verify_link)
    .service(security::security_status)
    .service(mfa::send_code)
    .service(mfa::verify_mfa)
    .service(mfa::provision_totp)
    .service(mfa::mfa_status)
    .service(payments::payment_status)
    .service(payments::payment_webhook);
}
