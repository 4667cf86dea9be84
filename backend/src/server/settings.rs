//! Service configuration loaded via OrthoConfig from CLI, environment, and
//! file.

use std::net::SocketAddr;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use envelope_backend::domain::envelope::DEFAULT_SIGNING_BASE_URL;
use envelope_backend::domain::signed_link::{LINK_TTL_MS, SESSION_TOKEN_TTL_MS};
use envelope_backend::inbound::http::webhook_signature::DEFAULT_TOLERANCE_SECS;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SIGNING_SECRET_FILE: &str = "/var/run/secrets/signing_secret";
const DEFAULT_CODE_TTL_MS: i64 = 300_000;
const DEFAULT_CODE_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_CODE_ISSUE_LIMIT: u32 = 3;
const DEFAULT_CODE_ISSUE_WINDOW_MS: i64 = 600_000;
const DEFAULT_EVENT_DEDUP_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_TOTP_ISSUER: &str = "Sirsi";
const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 10;

/// Settings for the envelope service. Optional fields fall back to defaults
/// in their accessors.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ENVELOPE")]
pub struct EnvelopeSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// File holding the HMAC secret for signed links and session tokens.
    pub signing_secret_file: Option<PathBuf>,
    /// Page that signed links point at.
    pub signing_base_url: Option<String>,
    /// Signed-link lifetime.
    pub link_ttl_ms: Option<i64>,
    /// Session token lifetime.
    pub session_token_ttl_ms: Option<i64>,
    /// Channel code lifetime.
    pub code_ttl_ms: Option<i64>,
    /// Wrong guesses allowed per channel code.
    #[ortho_config(default = 5)]
    pub code_max_attempts: u32,
    /// Channel codes issued per target within one issuance window.
    #[ortho_config(default = 3)]
    pub code_issue_limit: u32,
    /// Length of the channel code issuance window.
    pub code_issue_window_ms: Option<i64>,
    /// How long consumed link nonces are remembered.
    pub replay_window_ms: Option<i64>,
    /// How long processed gateway event ids are remembered.
    pub event_dedup_ttl_secs: Option<i64>,
    /// Issuer label in TOTP provisioning URIs.
    pub totp_issuer: Option<String>,
    /// Renderer endpoint; completion is only logged when absent.
    pub renderer_url: Option<String>,
    /// Notifier base URL; deliveries are only logged when absent.
    pub notifier_url: Option<String>,
    /// Per-request timeout for renderer and notifier calls.
    pub collaborator_timeout_secs: Option<u64>,
    /// File holding the gateway webhook secret; webhooks are unsigned when
    /// absent.
    pub gateway_webhook_secret_file: Option<PathBuf>,
    /// Allowed skew between a webhook's signed timestamp and now.
    pub webhook_tolerance_secs: Option<i64>,
    /// Browser origins allowed to call guest endpoints; comma-separated in
    /// the environment.
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            bind_addr: None,
            signing_secret_file: None,
            signing_base_url: None,
            link_ttl_ms: None,
            session_token_ttl_ms: None,
            code_ttl_ms: None,
            code_max_attempts: DEFAULT_CODE_MAX_ATTEMPTS,
            code_issue_limit: DEFAULT_CODE_ISSUE_LIMIT,
            code_issue_window_ms: None,
            replay_window_ms: None,
            event_dedup_ttl_secs: None,
            totp_issuer: None,
            renderer_url: None,
            notifier_url: None,
            collaborator_timeout_secs: None,
            gateway_webhook_secret_file: None,
            webhook_tolerance_secs: None,
            allowed_origins: None,
        }
    }
}

/// Invalid setting value.
#[derive(Debug, thiserror::Error)]
#[error("invalid {name}: {message}")]
pub struct SettingsError {
    name: &'static str,
    message: String,
}

impl EnvelopeSettings {
    /// Address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|err: std::net::AddrParseError| SettingsError {
                name: "bind_addr",
                message: err.to_string(),
            })
    }

    pub fn signing_secret_file(&self) -> PathBuf {
        self.signing_secret_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SIGNING_SECRET_FILE))
    }

    pub fn signing_base_url(&self) -> &str {
        self.signing_base_url
            .as_deref()
            .unwrap_or(DEFAULT_SIGNING_BASE_URL)
    }

    pub fn link_ttl_ms(&self) -> i64 {
        self.link_ttl_ms.unwrap_or(LINK_TTL_MS)
    }

    pub fn session_token_ttl_ms(&self) -> i64 {
        self.session_token_ttl_ms.unwrap_or(SESSION_TOKEN_TTL_MS)
    }

    pub fn code_ttl_ms(&self) -> i64 {
        self.code_ttl_ms.unwrap_or(DEFAULT_CODE_TTL_MS)
    }

    pub const fn code_max_attempts(&self) -> u32 {
        self.code_max_attempts
    }

    pub const fn code_issue_limit(&self) -> u32 {
        self.code_issue_limit
    }

    pub fn code_issue_window_ms(&self) -> i64 {
        self.code_issue_window_ms
            .unwrap_or(DEFAULT_CODE_ISSUE_WINDOW_MS)
    }

    /// Defaults to the link lifetime.
    pub fn replay_window_ms(&self) -> i64 {
        self.replay_window_ms.unwrap_or_else(|| self.link_ttl_ms())
    }

    pub fn event_dedup_ttl_secs(&self) -> i64 {
        self.event_dedup_ttl_secs
            .unwrap_or(DEFAULT_EVENT_DEDUP_TTL_SECS)
    }

    pub fn totp_issuer(&self) -> &str {
        self.totp_issuer.as_deref().unwrap_or(DEFAULT_TOTP_ISSUER)
    }

    pub fn collaborator_timeout_secs(&self) -> u64 {
        self.collaborator_timeout_secs
            .unwrap_or(DEFAULT_COLLABORATOR_TIMEOUT_SECS)
    }

    pub fn webhook_tolerance_secs(&self) -> i64 {
        self.webhook_tolerance_secs
            .unwrap_or(DEFAULT_TOLERANCE_SECS)
    }

    /// Allowed origins with blanks dropped.
    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .iter()
            .flatten()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Check the values that have no sensible fallback when wrong.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("link_ttl_ms", self.link_ttl_ms()),
            ("session_token_ttl_ms", self.session_token_ttl_ms()),
            ("code_ttl_ms", self.code_ttl_ms()),
            ("code_issue_window_ms", self.code_issue_window_ms()),
            ("replay_window_ms", self.replay_window_ms()),
            ("event_dedup_ttl_secs", self.event_dedup_ttl_secs()),
            ("webhook_tolerance_secs", self.webhook_tolerance_secs()),
        ];
        if let Some((name, value)) = positive.into_iter().find(|(_, value)| *value <= 0) {
            return Err(SettingsError {
                name,
                message: format!("must be positive, got {value}"),
            });
        }
        for (name, value) in [
            ("code_max_attempts", self.code_max_attempts()),
            ("code_issue_limit", self.code_issue_limit()),
        ] {
            if value == 0 {
                return Err(SettingsError {
                    name,
                    message: "must be at least 1".to_owned(),
                });
            }
        }
        self.bind_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use super::*;

    const VARS: [&str; 8] = [
        "ENVELOPE_BIND_ADDR",
        "ENVELOPE_LINK_TTL_MS",
        "ENVELOPE_REPLAY_WINDOW_MS",
        "ENVELOPE_ALLOWED_ORIGINS",
        "ENVELOPE_TOTP_ISSUER",
        "ENVELOPE_CODE_MAX_ATTEMPTS",
        "ENVELOPE_CODE_ISSUE_LIMIT",
        "ENVELOPE_CODE_ISSUE_WINDOW_MS",
    ];

    fn load_from_empty_args() -> EnvelopeSettings {
        EnvelopeSettings::load_from_iter([OsString::from("envelope-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.link_ttl_ms(), 300_000);
        assert_eq!(settings.replay_window_ms(), 300_000);
        assert_eq!(settings.code_max_attempts(), 5);
        assert_eq!(settings.code_issue_limit(), 3);
        assert_eq!(settings.code_issue_window_ms(), 600_000);
        assert_eq!(settings.totp_issuer(), "Sirsi");
        assert_eq!(settings.signing_base_url(), DEFAULT_SIGNING_BASE_URL);
        assert!(settings.allowed_origins().is_empty());
        assert_eq!(
            settings.bind_addr().expect("default address"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("literal")
        );
        assert!(settings.validate().is_ok());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("ENVELOPE_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            ("ENVELOPE_LINK_TTL_MS", Some("60000".to_owned())),
            ("ENVELOPE_REPLAY_WINDOW_MS", None::<String>),
            (
                "ENVELOPE_ALLOWED_ORIGINS",
                Some("https://a.example,https://b.example".to_owned()),
            ),
            ("ENVELOPE_TOTP_ISSUER", Some("Assiduous".to_owned())),
            ("ENVELOPE_CODE_MAX_ATTEMPTS", Some("3".to_owned())),
            ("ENVELOPE_CODE_ISSUE_LIMIT", Some("2".to_owned())),
            ("ENVELOPE_CODE_ISSUE_WINDOW_MS", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.link_ttl_ms(), 60_000);
        assert_eq!(settings.replay_window_ms(), 60_000);
        assert_eq!(
            settings.allowed_origins(),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
        assert_eq!(settings.totp_issuer(), "Assiduous");
        assert_eq!(settings.code_max_attempts(), 3);
        assert_eq!(settings.code_issue_limit(), 2);
        assert_eq!(
            settings.bind_addr().expect("override address").port(),
            9000
        );
    }

    #[rstest]
    fn blank_origins_are_dropped() {
        let settings = EnvelopeSettings {
            allowed_origins: Some(vec![
                " https://a.example ".to_owned(),
                String::new(),
                "https://b.example".to_owned(),
            ]),
            ..EnvelopeSettings::default()
        };
        assert_eq!(
            settings.allowed_origins(),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
    }

    #[rstest]
    #[case(EnvelopeSettings { link_ttl_ms: Some(0), ..Default::default() }, "link_ttl_ms")]
    #[case(EnvelopeSettings { code_max_attempts: 0, ..Default::default() }, "code_max_attempts")]
    #[case(EnvelopeSettings { code_issue_limit: 0, ..Default::default() }, "code_issue_limit")]
    #[case(EnvelopeSettings { bind_addr: Some("nowhere".to_owned()), ..Default::default() }, "bind_addr")]
    fn validate_rejects_nonsense(#[case] settings: EnvelopeSettings, #[case] name: &str) {
        let err = settings.validate().expect_err("invalid settings");
        assert!(err.to_string().contains(name), "{err}");
    }
}
