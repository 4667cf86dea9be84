//! Backend entry-point: loads configuration and secrets, wires services, and
//! serves the REST API.

mod server;

use actix_web::web;
use color_eyre::eyre::WrapErr;
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use envelope_backend::inbound::http::health::HealthState;
use envelope_backend::inbound::http::session_config::fingerprint::key_fingerprint;
use envelope_backend::inbound::http::session_config::{BuildMode, session_settings_from_env};
use server::{EnvelopeSettings, ServerConfig, ServiceConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = EnvelopeSettings::load().wrap_err("failed to load settings")?;
    let mode = BuildMode::from_debug_assertions();

    let session = session_settings_from_env(&DefaultEnv::new(), mode)
        .wrap_err("invalid session configuration")?;
    info!(
        fingerprint = %key_fingerprint(&session.key),
        "session key loaded"
    );

    let services =
        ServiceConfig::from_settings(&settings, mode).wrap_err("invalid service configuration")?;
    let bind_addr = settings.bind_addr()?;
    let config = ServerConfig::new(session, bind_addr, services);
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(server::make_metrics());

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    info!(%bind_addr, "listening");
    server.await.wrap_err("server terminated with an error")
}
