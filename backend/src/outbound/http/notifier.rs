//! HTTP notification adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::transport::{JsonEndpoint, PostFailure};
use crate::domain::ports::{CodeDelivery, Notifier, NotifierError, ProvisioningNotice};

const CODES_PATH: &str = "codes";
const PROVISIONING_PATH: &str = "provisioning";

/// Posts deliveries to `{base}/codes` and `{base}/provisioning`.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    endpoint: JsonEndpoint,
}

impl HttpNotifier {
    /// Build a notifier client with a per-request timeout.
    ///
    /// A base without a trailing slash has one appended so both paths nest
    /// under it.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(mut base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            endpoint: JsonEndpoint::new(base, timeout)?,
        })
    }
}

impl From<PostFailure> for NotifierError {
    fn from(failure: PostFailure) -> Self {
        match failure {
            PostFailure::Transport(message) => Self::transport(message),
            PostFailure::Rejected { status, message } => Self::rejected(status, message),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_code(&self, delivery: &CodeDelivery) -> Result<(), NotifierError> {
        self.endpoint
            .post(CODES_PATH, delivery)
            .await
            .map_err(Into::into)
    }

    async fn send_provisioning(&self, notice: &ProvisioningNotice) -> Result<(), NotifierError> {
        self.endpoint
            .post(PROVISIONING_PATH, notice)
            .await
            .map_err(Into::into)
    }
}
