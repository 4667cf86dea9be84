//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **memory**: mutex-guarded stores for envelopes, codes, TOTP secrets,
//!   replay nonces, and processed webhook events
//! - **http**: reqwest clients for the renderer and notification services
//! - **logging**: the tracing audit trail and collaborator stand-ins
//! - **metrics**: Prometheus exporters (feature-gated)
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod http;
pub mod logging;
pub mod memory;
#[cfg(feature = "metrics")]
pub mod metrics;
