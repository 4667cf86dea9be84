//! Reqwest-backed adapters for the renderer and notification collaborators.
//!
//! These own transport details only: JSON serialisation, the per-request
//! timeout, and HTTP status mapping.

mod notifier;
mod renderer;
mod transport;

pub use notifier::HttpNotifier;
pub use renderer::HttpArtifactRenderer;
