//! Caller details captured by inbound adapters for audit records.

/// Network-level details of the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    /// Best-effort client IP (peer or forwarded address).
    pub ip: Option<String>,
    /// `User-Agent` header, if sent.
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// IP for audit records, `unknown` when absent.
    #[must_use]
    pub fn ip_or_unknown(&self) -> String {
        self.ip.clone().unwrap_or_else(|| "unknown".to_owned())
    }
}
