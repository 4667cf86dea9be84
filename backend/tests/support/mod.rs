//! Shared helpers for end-to-end HTTP tests.

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;

/// Cookie sessions without the `Secure` flag so the test client sends them.
pub fn session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Initialise a service exposing the `/api` surface over a harness state.
macro_rules! api_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state))
                .service(
                    actix_web::web::scope("/api")
                        .wrap(support::session_middleware())
                        .configure(envelope_backend::inbound::http::configure_api),
                ),
        )
        .await
    };
}
