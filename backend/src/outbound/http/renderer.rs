//! HTTP renderer adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::transport::{JsonEndpoint, PostFailure};
use crate::domain::ports::{ArtifactRenderer, ArtifactRendererError, RenderRequest};

/// Posts [`RenderRequest`]s as camelCase JSON to the renderer endpoint.
#[derive(Debug, Clone)]
pub struct HttpArtifactRenderer {
    endpoint: JsonEndpoint,
}

impl HttpArtifactRenderer {
    /// Build a renderer client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            endpoint: JsonEndpoint::new(endpoint, timeout)?,
        })
    }
}

impl From<PostFailure> for ArtifactRendererError {
    fn from(failure: PostFailure) -> Self {
        match failure {
            PostFailure::Transport(message) => Self::transport(message),
            PostFailure::Rejected { status, message } => Self::rejected(status, message),
        }
    }
}

#[async_trait]
impl ArtifactRenderer for HttpArtifactRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), ArtifactRendererError> {
        self.endpoint.post("", request).await.map_err(Into::into)
    }
}
