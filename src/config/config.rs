use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConsoleError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_stats_interval")]
    pub stats_interval_ms: u64,
    /// Periodic registry refresh. Absent means on demand only.
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,
    #[serde(default = "default_render_interval")]
    pub render_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogsConfig {
    /// Select the first listed resource for streaming on start
    #[serde(default = "default_follow_first")]
    pub follow_first: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_stats_interval() -> u64 {
    5000
}

fn default_render_interval() -> u64 {
    1000
}

fn default_follow_first() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_interval_ms: default_stats_interval(),
            refresh_interval_ms: None,
            render_interval_ms: default_render_interval(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            follow_first: default_follow_first(),
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConsoleError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConsoleError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ConsoleError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring.stats_interval_ms.max(1))
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring.render_interval_ms.max(50))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.monitoring
            .refresh_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
