//! `Origin` allow-list for browser-facing guest endpoints.

use actix_web::HttpRequest;
use actix_web::http::header::ORIGIN;
use tracing::warn;

use crate::domain::Error;

/// Exact-match origin allow-list.
///
/// Requests without an `Origin` header (server-to-server, same-origin GETs)
/// pass. An empty list disables the check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Build a policy from configured origins; trailing slashes are ignored.
    ///
    /// # Examples
    /// ```
    /// use envelope_backend::inbound::http::origin::OriginPolicy;
    ///
    /// let policy = OriginPolicy::new(["https://sign.sirsi.ai/"]);
    /// assert!(policy.allows("https://sign.sirsi.ai"));
    /// assert!(!policy.allows("https://sign.sirsi.ai.evil.example"));
    /// ```
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = origins
            .into_iter()
            .map(|origin| normalise(origin.as_ref()))
            .filter(|origin| !origin.is_empty())
            .collect();
        Self { allowed }
    }

    /// `true` when no allow-list is configured.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether `origin` may call guest endpoints.
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        let origin = normalise(origin);
        origin.is_empty() || self.allowed.is_empty() || self.allowed.contains(&origin)
    }

    /// Reject the request with `forbidden` when its origin is not allowed.
    pub fn check(&self, req: &HttpRequest) -> Result<(), Error> {
        let origin = req
            .headers()
            .get(ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if self.allows(origin) {
            Ok(())
        } else {
            warn!(origin, path = req.path(), "rejected request from unlisted origin");
            Err(Error::forbidden("origin not allowed"))
        }
    }
}

fn normalise(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
