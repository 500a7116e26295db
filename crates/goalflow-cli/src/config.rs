//! Configuration file management for goalflow.
//!
//! Provides a TOML-based config file at `~/.config/goalflow/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use goalflow_core::api::ApiConfig;
use goalflow_core::plan::StrategyKind;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub planner: PlannerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiSection {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: ApiConfig::DEFAULT_URL.to_string(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    ApiConfig::DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlannerSection {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token sent to the planning service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the goalflow config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/goalflow` or `~/.config/goalflow`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("goalflow");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("goalflow")
}

/// Return the path to the goalflow config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file may hold an API key, so it is made owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Where to reach the planning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GoalflowConfig {
    pub api: ApiConfig,
    pub strategy: StrategyKind,
    /// Present whenever an endpoint is configured, even if the synthesized
    /// strategy is selected.
    pub planner: Option<PlannerConfig>,
}

impl GoalflowConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API URL: `cli_api_url` > `GOALFLOW_API_URL` > `api.base_url` > `ApiConfig::DEFAULT_URL`
    /// - Strategy: `cli_strategy` > `GOALFLOW_STRATEGY` > `planner.strategy` > synthesized
    /// - Planner endpoint: `GOALFLOW_PLANNER_URL` > `planner.endpoint`
    /// - Planner key: `GOALFLOW_PLANNER_API_KEY` > `planner.api_key`
    pub fn resolve(cli_api_url: Option<&str>, cli_strategy: Option<StrategyKind>) -> Result<Self> {
        let file_config = load_config().ok();

        let base_url = if let Some(url) = cli_api_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("GOALFLOW_API_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.api.base_url.clone()
        } else {
            ApiConfig::DEFAULT_URL.to_string()
        };
        let timeout_secs = file_config
            .as_ref()
            .map(|cfg| cfg.api.request_timeout_secs)
            .unwrap_or(ApiConfig::DEFAULT_TIMEOUT_SECS);
        let api = ApiConfig::new(base_url).with_timeout(Duration::from_secs(timeout_secs));

        let strategy = if let Some(kind) = cli_strategy {
            kind
        } else if let Ok(raw) = std::env::var("GOALFLOW_STRATEGY") {
            raw.parse::<StrategyKind>()
                .context("GOALFLOW_STRATEGY env var is not a valid strategy")?
        } else if let Some(ref cfg) = file_config {
            cfg.planner.strategy
        } else {
            StrategyKind::default()
        };

        let endpoint = std::env::var("GOALFLOW_PLANNER_URL")
            .ok()
            .or_else(|| file_config.as_ref().and_then(|c| c.planner.endpoint.clone()));
        let api_key = std::env::var("GOALFLOW_PLANNER_API_KEY")
            .ok()
            .or_else(|| file_config.as_ref().and_then(|c| c.planner.api_key.clone()));
        let planner = endpoint.map(|endpoint| PlannerConfig { endpoint, api_key });

        if strategy == StrategyKind::Ai && planner.is_none() {
            bail!(
                "the ai strategy needs a planner endpoint; set GOALFLOW_PLANNER_URL or [planner].endpoint in {}",
                config_path().display()
            );
        }

        Ok(Self {
            api,
            strategy,
            planner,
        })
    }
}

/// Mask all but the last four characters of a secret.
pub fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
