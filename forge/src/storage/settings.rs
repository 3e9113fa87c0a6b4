//! Settings file management

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ForgeError;
use crate::logs::LogLevel;
use crate::template::DEFAULT_REUSABLE_WORKFLOWS;

/// Settings file read when neither `--settings` nor `FORGE_SETTINGS` is given
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// GitHub API configuration
    #[serde(default)]
    pub github: GitHubSettings,

    /// Access tokens keyed by user id
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    /// Token used for users without an entry in `tokens`
    #[serde(default)]
    pub fallback_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            server: ServerSettings::default(),
            github: GitHubSettings::default(),
            tokens: HashMap::new(),
            fallback_token: None,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ForgeError> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let settings = serde_json::from_str(&contents).map_err(|e| {
                    ForgeError::ConfigError(format!("invalid settings file {}: {}", path.display(), e))
                })?;
                info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Settings file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `GITHUB_TOKEN` and `FORGE_PORT` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
            self.fallback_token = Some(token);
        }

        if let Some(port) = lookup("FORGE_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid FORGE_PORT value: {}", port),
            }
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// GitHub API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    /// Base URL of the REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Value of the `X-GitHub-Api-Version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout of a single API request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Budget of a whole publish sequence
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Repository hosting the reusable workflows the generated YAML calls
    #[serde(default = "default_reusable_workflows")]
    pub reusable_workflows: String,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_api_version() -> String {
    "2022-11-28".to_string()
}

fn default_user_agent() -> String {
    format!("workflow-forge/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    120
}

fn default_reusable_workflows() -> String {
    DEFAULT_REUSABLE_WORKFLOWS.to_string()
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            reusable_workflows: default_reusable_workflows(),
        }
    }
}
