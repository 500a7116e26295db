//! HTTP implementation of [`GoalApi`] on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::config::ApiConfig;
use super::error::ApiError;
use super::trait_def::GoalApi;
use crate::models::{GoalInput, NewTask, PersistedGoal};

/// Longest response body kept in an [`ApiError::Status`] message.
const MAX_ERROR_BODY: usize = 512;

/// Backend client speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGoalApi {
    config: ApiConfig,
    client: reqwest::Client,
}

impl HttpGoalApi {
    /// Create a client for the backend described by `config`.
    ///
    /// Fails if the base URL does not parse or the client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        validate_url(&config.base_url)?;
        let client = build_client(config.request_timeout)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait]
impl GoalApi for HttpGoalApi {
    #[instrument(skip(self, goal), fields(title = %goal.title))]
    async fn create_goal(&self, goal: &GoalInput) -> Result<PersistedGoal, ApiError> {
        let url = self.config.goals_url();
        let response = post_json(&self.client, &url, goal, HeaderMap::new()).await?;
        decode_json(response, &url).await
    }

    #[instrument(skip(self, task), fields(task = %task.title))]
    async fn create_task(&self, goal_id: i64, task: &NewTask) -> Result<(), ApiError> {
        let url = self.config.goal_tasks_url(goal_id);
        post_json(&self.client, &url, task, HeaderMap::new()).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared request helpers
// ---------------------------------------------------------------------------

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ApiError::Client)
}

pub(crate) fn validate_url(url: &str) -> Result<(), ApiError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ApiError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

pub(crate) fn bearer_headers(token: Option<&str>) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// POST `body` as JSON and return the response if the status is 2xx.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    headers: HeaderMap,
) -> Result<reqwest::Response, ApiError> {
    debug!(url, "POST");
    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body: truncate_body(&body, MAX_ERROR_BODY),
    })
}

pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn truncate_body(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_owned();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_base_url() {
        let err = HttpGoalApi::new(ApiConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = HttpGoalApi::new(ApiConfig::new("ftp://example.test")).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn accepts_http_base_url() {
        let api = HttpGoalApi::new(ApiConfig::new("http://127.0.0.1:5000")).unwrap();
        assert_eq!(api.config().base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn bearer_header_is_set_when_token_present() {
        let headers = bearer_headers(Some("secret")).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert!(bearer_headers(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_timeout_is_applied() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config =
            ApiConfig::new(format!("http://{addr}")).with_timeout(Duration::from_millis(200));
        let api = HttpGoalApi::new(config).unwrap();
        let err = api
            .create_goal(&GoalInput::new("Learn Spanish", crate::models::CommitmentLevel::Low))
            .await
            .unwrap_err();

        match err {
            ApiError::Transport { source, .. } => assert!(source.is_timeout(), "got {source:?}"),
            other => panic!("expected a timeout, got {other:?}"),
        }
        server.abort();
    }

    #[test]
    fn truncate_body_keeps_short_input() {
        assert_eq!(truncate_body("short", 10), "short");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let s = "ééééé";
        let t = truncate_body(s, 3);
        assert_eq!(t, "é...");
    }
}
