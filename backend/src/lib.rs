//! Document-signing and payment-gated workflow backend.
//!
//! The crate is laid out hexagonally: [`domain`] holds the signing workflow
//! and its ports, [`inbound`] exposes it over HTTP, and [`outbound`] provides
//! in-memory, HTTP, and logging adapters.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod secret_file;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
