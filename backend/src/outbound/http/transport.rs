//! Shared POST-JSON plumbing for collaborator adapters.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use crate::domain::{TRACE_ID_HEADER, TraceId};

const USER_AGENT: &str = "envelope-backend/0.1";
const PREVIEW_CHAR_LIMIT: usize = 160;

/// Why a collaborator call failed, before mapping to a port error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum PostFailure {
    Transport(String),
    Rejected { status: u16, message: String },
}

/// A JSON endpoint reached through a client with a fixed timeout.
#[derive(Debug, Clone)]
pub(super) struct JsonEndpoint {
    client: Client,
    base: Url,
}

impl JsonEndpoint {
    pub(super) fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, base })
    }

    /// Resolve `path` against the base URL. An empty path posts to the base.
    pub(super) fn url(&self, path: &str) -> Result<Url, PostFailure> {
        if path.is_empty() {
            return Ok(self.base.clone());
        }
        self.base
            .join(path)
            .map_err(|error| PostFailure::Transport(format!("invalid collaborator path: {error}")))
    }

    pub(super) async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), PostFailure> {
        let mut request = self
            .client
            .post(self.url(path)?)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(trace_id) = TraceId::current() {
            request = request.header(TRACE_ID_HEADER, trace_id.to_string());
        }
        let response = request
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, body.as_ref()))
    }
}

fn map_transport_error(error: reqwest::Error) -> PostFailure {
    if error.is_timeout() {
        PostFailure::Transport(format!("timed out: {error}"))
    } else {
        PostFailure::Transport(error.to_string())
    }
}

pub(super) fn map_status_error(status: StatusCode, body: &[u8]) -> PostFailure {
    PostFailure::Rejected {
        status: status.as_u16(),
        message: body_preview(body),
    }
}

fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    use super::*;

    fn endpoint(base: &str) -> JsonEndpoint {
        let base = Url::parse(base).expect("valid url");
        JsonEndpoint::new(base, Duration::from_secs(1)).expect("client builds")
    }

    #[rstest]
    #[case("http://renderer.internal/", "", "http://renderer.internal/")]
    #[case("http://notify.internal/v1/", "codes", "http://notify.internal/v1/codes")]
    #[case("http://notify.internal/v1/", "provisioning", "http://notify.internal/v1/provisioning")]
    fn resolves_paths_against_base(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        let url = endpoint(base).url(path).expect("url resolves");
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn status_errors_carry_code_and_compact_preview() {
        let failure = map_status_error(StatusCode::BAD_GATEWAY, b"{\n  \"error\": \"down\"\n}");
        assert_eq!(
            failure,
            PostFailure::Rejected {
                status: 502,
                message: "{ \"error\": \"down\" }".to_owned(),
            }
        );
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(PREVIEW_CHAR_LIMIT + 10);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHAR_LIMIT + 3);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let failure = endpoint(&format!("http://127.0.0.1:{port}/"))
            .post("", &serde_json::json!({ "ping": true }))
            .await
            .expect_err("nothing listens");
        assert!(matches!(failure, PostFailure::Transport(_)));
    }
}
