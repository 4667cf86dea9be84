//! Port for a TTL-bounded "seen" set used to make tokens single-use.

use async_trait::async_trait;
use chrono::TimeDelta;

use super::define_port_error;

define_port_error! {
    /// Errors raised by replay guard adapters.
    pub enum ReplayGuardError {
        /// Backing store is unavailable.
        Unavailable { message: String } => "replay guard unavailable: {message}",
    }
}

/// Atomic check-and-insert over short-lived keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplayGuard: Send + Sync {
    /// Record `key` for `ttl`. Returns `true` when the key was not already
    /// present, `false` on replay.
    async fn check_and_insert(&self, key: &str, ttl: TimeDelta) -> Result<bool, ReplayGuardError>;
}
