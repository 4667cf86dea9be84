//! Port for the external renderer that produces the executed document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::define_port_error;

define_port_error! {
    /// Errors raised by renderer adapters.
    pub enum ArtifactRendererError {
        /// The renderer could not be reached or timed out.
        Transport { message: String } => "renderer transport failed: {message}",
        /// The renderer answered with a failure.
        Rejected { status: u16, message: String } =>
            "renderer rejected request ({status}): {message}",
    }
}

/// Everything the renderer needs to produce the final artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Envelope being finalised.
    pub envelope_id: String,
    /// Owning project.
    pub project_id: String,
    /// Name of the signer whose signature completed the envelope.
    pub signer_name: String,
    /// Email of that signer.
    pub signer_email: String,
    /// Signature image reference or data URL.
    pub signature_image: Option<String>,
    /// When the completing signature was recorded.
    pub signed_at: DateTime<Utc>,
    /// Selected plan description.
    pub plan_details: String,
    /// Human-facing contract reference, e.g. `SIRSI-3fa85f64`.
    pub contract_ref: String,
}

/// Renderer/storage collaborator invoked once per completed envelope.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    /// Render and store the executed document.
    async fn render(&self, request: &RenderRequest) -> Result<(), ArtifactRendererError>;
}
