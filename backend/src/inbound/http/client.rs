//! Caller details extracted from the request for audit records.

use actix_web::HttpRequest;
use actix_web::http::header::USER_AGENT;

use crate::domain::ClientContext;

/// Best-effort IP (forwarded header or peer) and user agent.
pub fn client_context(req: &HttpRequest) -> ClientContext {
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    ClientContext { ip, user_agent }
}
