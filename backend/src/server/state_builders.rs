//! Builders that turn settings into the HTTP state's service graph.
//!
//! Storage is in-memory. The renderer and notifier use HTTP adapters when
//! their URLs are configured and logging adapters otherwise.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};
use url::Url;

use envelope_backend::domain::envelope::{EnvelopeConfig, EnvelopePorts, EnvelopeService};
use envelope_backend::domain::one_time_code::{MfaConfig, MfaPorts, MfaService};
use envelope_backend::domain::payment::{
    PaymentPorts, PaymentReconciliationService, ReconciliationConfig,
};
use envelope_backend::domain::ports::{ArtifactRenderer, Notifier, ReconciliationMetrics};
use envelope_backend::domain::signed_link::{
    LinkCodec, LinkCodecConfig, SIGNING_SECRET_MIN_LEN, SignedLinkService, SigningSecret,
    SigningSecretError,
};
use envelope_backend::inbound::http::origin::OriginPolicy;
use envelope_backend::inbound::http::session::MFA_SESSION_TTL_SECS;
use envelope_backend::inbound::http::state::{HttpPolicy, HttpState, HttpStatePorts};
use envelope_backend::inbound::http::webhook_signature::WebhookVerifier;
use envelope_backend::outbound::http::{HttpArtifactRenderer, HttpNotifier};
use envelope_backend::outbound::logging::{
    LoggingArtifactRenderer, LoggingNotifier, TracingSecurityEventLog,
};
use envelope_backend::outbound::memory::{
    InMemoryEnvelopeRepository, InMemoryOneTimeCodeStore, InMemoryTotpSecretStore, TtlSeenSet,
};
use envelope_backend::secret_file::{
    BuildMode, SecretFileError, SecretFilePolicy, load_secret_file,
};

use super::settings::{EnvelopeSettings, SettingsError};

const WEBHOOK_SECRET_MIN_LEN: usize = 16;

/// Start-up failures while assembling services.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    SecretFile(#[from] SecretFileError),
    #[error("{label} unusable: {source}")]
    Secret {
        label: &'static str,
        #[source]
        source: SigningSecretError,
    },
    #[error("invalid {name} {value:?}: {source}")]
    Url {
        name: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build HTTP client for {name}: {source}")]
    Client {
        name: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Validated inputs for the service graph.
pub struct ServiceConfig {
    signing_secret: SigningSecret,
    webhook: Option<WebhookVerifier>,
    codec: LinkCodecConfig,
    envelope: EnvelopeConfig,
    mfa: MfaConfig,
    reconciliation: ReconciliationConfig,
    replay_window: TimeDelta,
    renderer_url: Option<Url>,
    notifier_url: Option<Url>,
    collaborator_timeout: Duration,
    allowed_origins: Vec<String>,
}

fn parse_url(name: &'static str, raw: Option<&str>) -> Result<Option<Url>, StartupError> {
    raw.map(|value| {
        Url::parse(value).map_err(|source| StartupError::Url {
            name,
            value: value.to_owned(),
            source,
        })
    })
    .transpose()
}

fn signing_secret(
    label: &'static str,
    material: &[u8],
) -> Result<SigningSecret, StartupError> {
    SigningSecret::new(material.to_vec()).map_err(|source| StartupError::Secret { label, source })
}

impl ServiceConfig {
    /// Validate settings and read secrets from disk.
    pub fn from_settings(settings: &EnvelopeSettings, mode: BuildMode) -> Result<Self, StartupError> {
        settings.validate()?;

        let signing = load_secret_file(
            &settings.signing_secret_file(),
            SecretFilePolicy {
                label: "signing secret",
                min_len: SIGNING_SECRET_MIN_LEN,
                ephemeral_len: SIGNING_SECRET_MIN_LEN,
                mode,
                allow_ephemeral: false,
            },
        )?;
        if signing.ephemeral {
            warn!("signed links will not survive a restart");
        }
        let link_secret = signing_secret("signing secret", &signing.bytes)?;

        // A configured gateway secret must be readable: a random fallback
        // would reject every delivery.
        let webhook = match &settings.gateway_webhook_secret_file {
            Some(path) => {
                let material = load_secret_file(
                    path,
                    SecretFilePolicy {
                        label: "gateway webhook secret",
                        min_len: WEBHOOK_SECRET_MIN_LEN,
                        ephemeral_len: 0,
                        mode: BuildMode::Release,
                        allow_ephemeral: false,
                    },
                )?;
                Some(WebhookVerifier::new(
                    signing_secret("gateway webhook secret", &material.bytes)?,
                    TimeDelta::seconds(settings.webhook_tolerance_secs()),
                ))
            }
            None => {
                warn!("no gateway webhook secret configured; webhooks are accepted unsigned");
                None
            }
        };

        Ok(Self {
            signing_secret: link_secret,
            webhook,
            codec: LinkCodecConfig {
                link_ttl_ms: settings.link_ttl_ms(),
                session_ttl_ms: settings.session_token_ttl_ms(),
            },
            envelope: EnvelopeConfig {
                signing_base_url: settings.signing_base_url().to_owned(),
                ..EnvelopeConfig::default()
            },
            mfa: MfaConfig {
                code_ttl: TimeDelta::milliseconds(settings.code_ttl_ms()),
                max_attempts: settings.code_max_attempts(),
                issue_limit: settings.code_issue_limit(),
                issue_window: TimeDelta::milliseconds(settings.code_issue_window_ms()),
                totp_issuer: settings.totp_issuer().to_owned(),
            },
            reconciliation: ReconciliationConfig {
                dedup_ttl: TimeDelta::seconds(settings.event_dedup_ttl_secs()),
                ..ReconciliationConfig::default()
            },
            replay_window: TimeDelta::milliseconds(settings.replay_window_ms()),
            renderer_url: parse_url("renderer_url", settings.renderer_url.as_deref())?,
            notifier_url: parse_url("notifier_url", settings.notifier_url.as_deref())?,
            collaborator_timeout: Duration::from_secs(settings.collaborator_timeout_secs()),
            allowed_origins: settings.allowed_origins(),
        })
    }
}

fn build_renderer(config: &ServiceConfig) -> Result<Arc<dyn ArtifactRenderer>, StartupError> {
    match &config.renderer_url {
        Some(url) => {
            info!(renderer = %url, "rendering completed envelopes over HTTP");
            let renderer = HttpArtifactRenderer::new(url.clone(), config.collaborator_timeout)
                .map_err(|source| StartupError::Client {
                    name: "renderer",
                    source,
                })?;
            Ok(Arc::new(renderer))
        }
        None => Ok(Arc::new(LoggingArtifactRenderer)),
    }
}

fn build_notifier(config: &ServiceConfig) -> Result<Arc<dyn Notifier>, StartupError> {
    match &config.notifier_url {
        Some(url) => {
            info!(notifier = %url, "delivering notifications over HTTP");
            let notifier = HttpNotifier::new(url.clone(), config.collaborator_timeout).map_err(
                |source| StartupError::Client {
                    name: "notifier",
                    source,
                },
            )?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LoggingNotifier)),
    }
}

/// Assemble the HTTP state from configuration.
pub(super) fn build_http_state(
    config: &ServiceConfig,
    metrics: Arc<dyn ReconciliationMetrics>,
    clock: Arc<dyn Clock>,
) -> Result<HttpState, StartupError> {
    let audit = Arc::new(TracingSecurityEventLog);
    let notifier = build_notifier(config)?;
    let envelopes = Arc::new(InMemoryEnvelopeRepository::new());
    let codec = Arc::new(LinkCodec::new(
        config.signing_secret.clone(),
        clock.clone(),
        config.codec,
    ));

    let envelope_service = Arc::new(EnvelopeService::new(
        EnvelopePorts {
            repository: envelopes.clone(),
            renderer: build_renderer(config)?,
            audit: audit.clone(),
        },
        codec.clone(),
        clock.clone(),
        config.envelope.clone(),
    ));
    let links = SignedLinkService::new(
        codec,
        Arc::new(TtlSeenSet::new(clock.clone())),
        audit.clone(),
    )
    .with_replay_window(config.replay_window);
    let mfa = MfaService::new(
        MfaPorts {
            codes: Arc::new(InMemoryOneTimeCodeStore::new()),
            totp_secrets: Arc::new(InMemoryTotpSecretStore::new()),
            replay_guard: Arc::new(TtlSeenSet::new(clock.clone())),
            notifier: notifier.clone(),
            audit,
        },
        clock.clone(),
        config.mfa.clone(),
    );
    let payments = PaymentReconciliationService::new(
        PaymentPorts {
            envelopes,
            processed_events: Arc::new(TtlSeenSet::new(clock.clone())),
            notifier,
            metrics,
        },
        clock.clone(),
        config.reconciliation,
    );

    let origins = OriginPolicy::new(&config.allowed_origins);
    if origins.is_open() {
        warn!("no origin allow-list configured; guest endpoints accept any origin");
    }

    Ok(HttpState::new(
        HttpStatePorts {
            envelopes: envelope_service.clone(),
            envelopes_query: envelope_service,
            links: Arc::new(links),
            mfa: Arc::new(mfa),
            payments: Arc::new(payments),
        },
        HttpPolicy {
            origins,
            webhook: config.webhook.clone(),
            link_ttl_ms: config.codec.link_ttl_ms,
            mfa_session_ttl_secs: MFA_SESSION_TTL_SECS,
        },
        clock,
    ))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use std::io::Write;

    use envelope_backend::domain::ports::NoOpReconciliationMetrics;
    use mockable::DefaultClock;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    fn secret_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write secret");
        file
    }

    #[rstest]
    fn release_requires_a_signing_secret_file() {
        let settings = EnvelopeSettings {
            signing_secret_file: Some("/nonexistent/signing_secret".into()),
            ..EnvelopeSettings::default()
        };
        let result = ServiceConfig::from_settings(&settings, BuildMode::Release);
        assert!(matches!(result, Err(StartupError::SecretFile(_))));
    }

    #[rstest]
    fn release_rejects_short_signing_secret() {
        let file = secret_file(b"too-short");
        let settings = EnvelopeSettings {
            signing_secret_file: Some(file.path().to_path_buf()),
            ..EnvelopeSettings::default()
        };
        let result = ServiceConfig::from_settings(&settings, BuildMode::Release);
        assert!(matches!(
            result,
            Err(StartupError::SecretFile(SecretFileError::TooShort { .. }))
        ));
    }

    #[rstest]
    fn debug_falls_back_to_ephemeral_signing_secret() {
        let settings = EnvelopeSettings {
            signing_secret_file: Some("/nonexistent/signing_secret".into()),
            ..EnvelopeSettings::default()
        };
        let config = ServiceConfig::from_settings(&settings, BuildMode::Debug)
            .expect("debug builds tolerate a missing secret");
        assert!(config.webhook.is_none());
    }

    #[rstest]
    fn configured_webhook_secret_must_exist_even_in_debug() {
        let signing = secret_file(&[b'k'; 48]);
        let settings = EnvelopeSettings {
            signing_secret_file: Some(signing.path().to_path_buf()),
            gateway_webhook_secret_file: Some("/nonexistent/webhook_secret".into()),
            ..EnvelopeSettings::default()
        };
        let result = ServiceConfig::from_settings(&settings, BuildMode::Debug);
        assert!(matches!(result, Err(StartupError::SecretFile(_))));
    }

    #[rstest]
    fn invalid_renderer_url_is_reported() {
        let signing = secret_file(&[b'k'; 48]);
        let settings = EnvelopeSettings {
            signing_secret_file: Some(signing.path().to_path_buf()),
            renderer_url: Some("not a url".to_owned()),
            ..EnvelopeSettings::default()
        };
        let result = ServiceConfig::from_settings(&settings, BuildMode::Release);
        assert!(matches!(result, Err(StartupError::Url { name: "renderer_url", .. })));
    }

    #[rstest]
    fn builds_state_with_configured_policy() {
        let signing = secret_file(&[b'k'; 48]);
        let webhook = secret_file(b"whsec_0123456789abcdef");
        let settings = EnvelopeSettings {
            signing_secret_file: Some(signing.path().to_path_buf()),
            gateway_webhook_secret_file: Some(webhook.path().to_path_buf()),
            allowed_origins: Some(vec!["https://sign.example".to_owned()]),
            link_ttl_ms: Some(120_000),
            ..EnvelopeSettings::default()
        };
        let config =
            ServiceConfig::from_settings(&settings, BuildMode::Release).expect("valid settings");
        let state = build_http_state(
            &config,
            Arc::new(NoOpReconciliationMetrics),
            Arc::new(DefaultClock),
        )
        .expect("state builds");

        assert!(state.policy.webhook.is_some());
        assert!(!state.policy.origins.is_open());
        assert_eq!(state.policy.link_ttl_ms, 120_000);
    }
}
