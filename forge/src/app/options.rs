//! Application configuration options

use std::time::Duration;

use crate::storage::settings::{GitHubSettings, ServerSettings, Settings};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Local HTTP server configuration
    pub server: ServerSettings,

    /// GitHub API configuration
    pub github: GitHubSettings,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            github: GitHubSettings::default(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: settings.server.clone(),
            github: settings.github.clone(),
            ..Default::default()
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.github.operation_timeout_secs)
    }
}
