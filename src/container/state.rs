use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Lifecycle status as reported by the backend.
///
/// Comparison is case-insensitive; the backend reports stopped containers as
/// "Stopped", which is treated as `Exited`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    Running,
    Exited,
    Other(String),
}

impl ResourceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ResourceStatus::Running)
    }
}

impl From<String> for ResourceStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => ResourceStatus::Running,
            "exited" | "stopped" => ResourceStatus::Exited,
            _ => ResourceStatus::Other(raw),
        }
    }
}

impl From<ResourceStatus> for String {
    fn from(status: ResourceStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Running => write!(f, "Running"),
            ResourceStatus::Exited => write!(f, "Exited"),
            ResourceStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// A managed container as listed by `GET /api/containers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub status: ResourceStatus,
    #[serde(default = "placeholder")]
    pub port: String,
    /// Creation/start timestamp as sent by the backend (usually RFC 3339)
    #[serde(default)]
    pub uptime: String,
}

impl Resource {
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Uptime rendered as `YYYY-MM-DD HH:MM:SS` when parseable.
    pub fn uptime_display(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.uptime) {
            Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Err(_) => self.uptime.clone(),
        }
    }
}

fn placeholder() -> String {
    "-".to_string()
}

/// Body of `GET /api/containers`
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerList {
    #[serde(default)]
    pub containers: Vec<Resource>,
    #[serde(default)]
    pub metrics: Option<ListMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMetrics {
    pub active_containers: u64,
    pub total_containers: u64,
}

/// A metric value that may come as a display string or a bare number.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue(pub String);

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => Ok(MetricValue(s)),
            serde_json::Value::Number(n) => Ok(MetricValue(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `GET /api/containers/{id}/stats`
#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    pub cpu: MetricValue,
    pub mem: MetricValue,
}

/// Point-in-time metrics for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSample {
    pub cpu: String,
    pub mem: String,
    pub sampled_at: DateTime<Utc>,
}

impl From<StatsResponse> for StatsSample {
    fn from(resp: StatsResponse) -> Self {
        Self {
            cpu: resp.cpu.0,
            mem: resp.mem.0,
            sampled_at: Utc::now(),
        }
    }
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub docker_connected: bool,
}
