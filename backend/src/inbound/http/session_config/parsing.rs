//! Typed readers for the session cookie toggles.

use actix_web::cookie::SameSite;
use mockable::Env;
use tracing::warn;

use super::{BuildMode, SAMESITE_ENV, SessionConfigError};

const FLAG_VALUES: &str = "1|0|true|false|yes|no|on|off";
const SAME_SITE_VALUES: &str = "Strict|Lax|None";

/// Reads toggles from an [`Env`], relaxing failures in debug builds only.
pub(super) struct EnvReader<'a, E> {
    env: &'a E,
    mode: BuildMode,
}

impl<'a, E: Env> EnvReader<'a, E> {
    pub(super) const fn new(env: &'a E, mode: BuildMode) -> Self {
        Self { env, mode }
    }

    pub(super) const fn mode(&self) -> BuildMode {
        self.mode
    }

    pub(super) fn string(&self, name: &str) -> Option<String> {
        self.env.string(name)
    }

    /// Debug builds log `error` and take `fallback`; release builds fail.
    fn relax<T>(&self, fallback: T, error: SessionConfigError) -> Result<T, SessionConfigError> {
        if self.mode.is_debug() {
            warn!(%error, "relaxing session setting for debug build");
            Ok(fallback)
        } else {
            Err(error)
        }
    }

    /// Read a boolean toggle.
    pub(super) fn flag(&self, name: &'static str, fallback: bool) -> Result<bool, SessionConfigError> {
        let Some(raw) = self.env.string(name) else {
            return self.relax(fallback, SessionConfigError::MissingEnv { name });
        };
        let normalised = raw.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => self.relax(
                fallback,
                SessionConfigError::InvalidEnv {
                    name,
                    value: raw,
                    expected: FLAG_VALUES,
                },
            ),
        }
    }

    /// Read the `SameSite` policy; `None` needs a secure cookie.
    pub(super) fn same_site(&self, cookie_secure: bool) -> Result<SameSite, SessionConfigError> {
        let fallback = if self.mode.is_debug() {
            SameSite::Lax
        } else {
            SameSite::Strict
        };
        let Some(raw) = self.env.string(SAMESITE_ENV) else {
            return self.relax(fallback, SessionConfigError::MissingEnv { name: SAMESITE_ENV });
        };
        let normalised = raw.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" if cookie_secure => Ok(SameSite::None),
            "none" => self.relax(SameSite::None, SessionConfigError::InsecureSameSiteNone),
            _ => self.relax(
                fallback,
                SessionConfigError::InvalidEnv {
                    name: SAMESITE_ENV,
                    value: raw,
                    expected: SAME_SITE_VALUES,
                },
            ),
        }
    }
}
