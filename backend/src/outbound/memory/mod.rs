//! In-process adapters for the storage ports.
//!
//! Every adapter guards a map with a `std::sync::Mutex` and never holds the
//! lock across an `.await`. A poisoned lock surfaces as the port's
//! connection/unavailable error so callers see a retryable failure.

mod envelope_repository;
mod one_time_code_store;
mod seen_set;
mod totp_secret_store;

pub use envelope_repository::InMemoryEnvelopeRepository;
pub use one_time_code_store::InMemoryOneTimeCodeStore;
pub use seen_set::TtlSeenSet;
pub use totp_secret_store::InMemoryTotpSecretStore;
