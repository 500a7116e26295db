use std::env;
use std::time::Duration;

/// Backend connection settings.
///
/// Reads from the `GOALFLOW_API_URL` environment variable, falling back to
/// `http://localhost:5000` when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL of the backend, without the `/api` suffix.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// The default base URL used when nothing else is configured.
    pub const DEFAULT_URL: &str = "http://localhost:5000";

    /// The default per-request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let base_url =
            env::var("GOALFLOW_API_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self::new(base_url)
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Join `path` onto the base URL, tolerating a trailing slash on either side.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `POST` target for creating a goal.
    pub fn goals_url(&self) -> String {
        self.endpoint("/api/goals")
    }

    /// `POST` target for creating a task under `goal_id`.
    pub fn goal_tasks_url(&self, goal_id: i64) -> String {
        self.endpoint(&format!("/api/goals/{goal_id}/tasks"))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
