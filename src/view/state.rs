//! Aggregated view state
//!
//! Reads the registry, the stats store and the log session and builds an
//! immutable `Snapshot` for the renderer. It owns only presentation state:
//! backend health, the log filter, pending dispatches and notices.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use regex::Regex;
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::container::registry::ResourceRegistry;
use crate::container::state::{BackendHealth, Resource, StatsSample};
use crate::error::ConsoleError;
use crate::monitor::console::{LogReader, LogView};
use crate::monitor::stats::StatsStore;

const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendStatus {
    Unknown,
    Connected { docker_connected: bool },
    Unreachable(String),
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStatus::Unknown => write!(f, "Unknown"),
            BackendStatus::Connected { docker_connected: true } => write!(f, "Connected"),
            BackendStatus::Connected { docker_connected: false } => write!(f, "Connected (docker offline)"),
            BackendStatus::Unreachable(_) => write!(f, "Unreachable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRow {
    pub resource: Resource,
    /// Only present for running containers that produced a sample
    pub stats: Option<StatsSample>,
    pub pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overview {
    pub active: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub rows: Vec<ResourceRow>,
    pub overview: Overview,
    pub backend: BackendStatus,
    pub registry_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub logs: LogView,
    pub filter: Option<String>,
    pub notices: Vec<String>,
}

pub struct ViewState {
    registry: Arc<ResourceRegistry>,
    stats: StatsStore,
    logs: LogReader,
    backend: RwLock<BackendStatus>,
    filter: RwLock<Option<Regex>>,
    pending: DashSet<String>,
    notices: RwLock<VecDeque<String>>,
}

impl ViewState {
    pub fn new(registry: Arc<ResourceRegistry>, stats: StatsStore, logs: LogReader) -> Self {
        Self {
            registry,
            stats,
            logs,
            backend: RwLock::new(BackendStatus::Unknown),
            filter: RwLock::new(None),
            pending: DashSet::new(),
            notices: RwLock::new(VecDeque::with_capacity(MAX_NOTICES)),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let set = self.registry.snapshot().await;
        let samples = self.stats.all().await;

        let rows = set
            .resources
            .iter()
            .map(|resource| ResourceRow {
                stats: if resource.is_running() { samples.get(&resource.id).cloned() } else { None },
                pending: self.pending.contains(&resource.id),
                resource: resource.clone(),
            })
            .collect();

        let filter = self.filter.read().await;
        let logs = self.logs.view(filter.as_ref()).await;

        Snapshot {
            rows,
            overview: Overview {
                active: set.active_count(),
                total: set.resources.len(),
            },
            backend: self.backend.read().await.clone(),
            registry_error: self.registry.last_error().await,
            refreshed_at: set.refreshed_at,
            logs,
            filter: filter.as_ref().map(|re| re.as_str().to_string()),
            notices: self.notices.read().await.iter().cloned().collect(),
        }
    }

    pub async fn set_health(&self, health: Result<BackendHealth, ConsoleError>) {
        let status = match health {
            Ok(h) => {
                if h.status != "ok" {
                    tracing::warn!("Backend reports health status '{}'", h.status);
                }
                BackendStatus::Connected {
                    docker_connected: h.docker_connected,
                }
            }
            Err(e) => {
                tracing::warn!("Backend health probe failed: {}", e);
                BackendStatus::Unreachable(e.to_string())
            }
        };
        *self.backend.write().await = status;
    }

    /// Mark a dispatch outstanding. Returns false if one already is.
    pub fn begin_action(&self, id: &str) -> bool {
        self.pending.insert(id.to_string())
    }

    pub fn finish_action(&self, id: &str) {
        self.pending.remove(id);
    }

    #[allow(unused)]
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub async fn notice(&self, message: impl Into<String>) {
        let mut notices = self.notices.write().await;
        if notices.len() >= MAX_NOTICES {
            notices.pop_front();
        }
        notices.push_back(message.into());
    }

    /// Set or clear the log filter. An invalid pattern leaves the current
    /// filter in place.
    pub async fn set_filter(&self, pattern: Option<&str>) -> Result<(), regex::Error> {
        let compiled = pattern.map(Regex::new).transpose()?;
        *self.filter.write().await = compiled;
        Ok(())
    }

    /// Write the visible (filtered) log lines to `path`, returning the count.
    pub async fn export_logs(&self, path: impl AsRef<Path>) -> std::io::Result<usize> {
        let filter = self.filter.read().await;
        let view = self.logs.view(filter.as_ref()).await;

        let mut body = String::new();
        for line in &view.lines {
            body.push_str(&line.text);
            body.push('\n');
        }
        tokio::fs::write(path, body).await?;
        Ok(view.lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::console::{Connectivity, LogStreamSession};
    use crate::monitor::stats::PollerSet;
    use crate::remote::testing::{resource, MockControlPlane};
    use std::time::Duration;

    struct Fixture {
        mock: Arc<MockControlPlane>,
        registry: Arc<ResourceRegistry>,
        pollers: PollerSet,
        session: LogStreamSession,
        view: ViewState,
    }

    fn fixture() -> Fixture {
        let mock = Arc::new(MockControlPlane::new());
        let registry = Arc::new(ResourceRegistry::new(mock.clone()));
        let pollers = PollerSet::new(mock.clone(), StatsStore::new(), Duration::from_secs(5));
        let session = LogStreamSession::new(mock.clone());
        let view = ViewState::new(registry.clone(), pollers.store(), session.reader());
        Fixture {
            mock,
            registry,
            pollers,
            session,
            view,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_shows_stats_only_for_running() {
        let mut fx = fixture();
        fx.mock.set_containers(vec![resource("a", "Running"), resource("b", "Exited")]);
        fx.mock.set_stats("a", "5%", "64MiB");
        fx.registry.refresh().await.unwrap();
        fx.pollers.reconcile(&fx.registry.snapshot().await).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snap = fx.view.snapshot().await;
        assert_eq!(snap.overview, Overview { active: 1, total: 2 });
        assert_eq!(snap.rows[0].stats.as_ref().unwrap().cpu, "5%");
        assert!(snap.rows[1].stats.is_none());
        assert_eq!(snap.logs.connectivity, Connectivity::Disconnected);

        fx.pollers.stop_all().await;
    }

    #[tokio::test]
    async fn pending_dispatch_is_debounced() {
        let fx = fixture();
        assert!(fx.view.begin_action("a"));
        assert!(!fx.view.begin_action("a"));
        assert!(fx.view.is_pending("a"));

        fx.view.finish_action("a");
        assert!(fx.view.begin_action("a"));
    }

    #[tokio::test]
    async fn health_failure_marks_backend_unreachable() {
        let fx = fixture();
        fx.view.set_health(Err(ConsoleError::Transport("refused".into()))).await;
        assert!(matches!(fx.view.snapshot().await.backend, BackendStatus::Unreachable(_)));

        fx.view
            .set_health(Ok(BackendHealth {
                status: "ok".into(),
                docker_connected: true,
            }))
            .await;
        assert_eq!(fx.view.snapshot().await.backend.to_string(), "Connected");
    }

    #[tokio::test]
    async fn notices_are_bounded() {
        let fx = fixture();
        for i in 0..8 {
            fx.view.notice(format!("n{}", i)).await;
        }
        let notices = fx.view.snapshot().await.notices;
        assert_eq!(notices, vec!["n3", "n4", "n5", "n6", "n7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn filter_and_export_use_visible_lines() {
        let mut fx = fixture();
        let feed = fx.mock.log_feed("a");
        fx.session.open("a").await;
        for line in ["INFO ready", "ERROR disk full", "INFO tick"] {
            feed.send(Ok(line.to_string())).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(fx.view.set_filter(Some("(")).await.is_err());
        fx.view.set_filter(Some("^INFO")).await.unwrap();
        assert!(fx.view.set_filter(Some("[")).await.is_err());

        let snap = fx.view.snapshot().await;
        assert_eq!(snap.filter.as_deref(), Some("^INFO"));
        assert_eq!(snap.logs.lines.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        assert_eq!(fx.view.export_logs(&path).await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "INFO ready\nINFO tick\n");

        fx.view.set_filter(None).await.unwrap();
        assert_eq!(fx.view.snapshot().await.logs.lines.len(), 3);
    }
}
