//! Resource registry
//!
//! Holds the last known container set. Every refresh replaces the set
//! wholesale; a failed refresh keeps the previous set. Refreshes carry a
//! generation number and a completion older than the applied generation is
//! discarded, so concurrent refreshes settle on the newest request.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use super::state::Resource;
use crate::error::ConsoleError;
use crate::remote::client::ControlPlane;

/// Immutable view of the registry at one generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    pub generation: u64,
    pub resources: Arc<Vec<Resource>>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl ResourceSet {
    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn running_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().filter(|r| r.is_running()).map(|r| r.id.as_str())
    }

    pub fn active_count(&self) -> usize {
        self.resources.iter().filter(|r| r.is_running()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the set
    Applied { generation: u64, count: usize },
    /// A newer refresh was already applied; this response was dropped
    Stale { generation: u64 },
}

pub struct ResourceRegistry {
    control: Arc<dyn ControlPlane>,
    issued: AtomicU64,
    current: RwLock<ResourceSet>,
    /// Failed generation and its message
    last_error: RwLock<Option<(u64, String)>>,
    changes: watch::Sender<ResourceSet>,
}

impl ResourceRegistry {
    pub fn new(control: Arc<dyn ControlPlane>) -> Self {
        let (changes, _) = watch::channel(ResourceSet::default());

        Self {
            control,
            issued: AtomicU64::new(0),
            current: RwLock::new(ResourceSet::default()),
            last_error: RwLock::new(None),
            changes,
        }
    }

    /// Fetch the container list and replace the known set.
    ///
    /// On failure the previous set stays in place and the error is returned
    /// for display; nothing else is affected.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ConsoleError> {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Registry refresh #{} issued", generation);

        let resources = match self.control.list_containers().await {
            Ok(resources) => resources,
            Err(e) => {
                self.record_failure(generation, &e).await;
                return Err(e);
            }
        };

        let mut current = self.current.write().await;
        if generation <= current.generation {
            tracing::debug!(
                "Discarding refresh #{}, generation {} already applied",
                generation,
                current.generation
            );
            return Ok(RefreshOutcome::Stale { generation });
        }

        let count = resources.len();
        *current = ResourceSet {
            generation,
            resources: Arc::new(resources),
            refreshed_at: Some(Utc::now()),
        };
        self.changes.send_replace(current.clone());

        let mut last_error = self.last_error.write().await;
        if last_error.as_ref().is_some_and(|(failed, _)| *failed < generation) {
            *last_error = None;
        }
        drop(last_error);
        drop(current);

        tracing::info!("Registry refreshed: {} containers (generation {})", count, generation);

        Ok(RefreshOutcome::Applied { generation, count })
    }

    /// Keep the error only if nothing newer has settled since this
    /// refresh was issued.
    async fn record_failure(&self, generation: u64, error: &ConsoleError) {
        let current = self.current.read().await;
        let mut last_error = self.last_error.write().await;

        let newer_settled = current.generation > generation
            || last_error.as_ref().is_some_and(|(failed, _)| *failed > generation);
        if newer_settled {
            tracing::debug!("Refresh #{} failed after a newer one settled: {}", generation, error);
            return;
        }

        tracing::warn!("Registry refresh #{} failed: {}", generation, error);
        *last_error = Some((generation, error.to_string()));
    }

    pub async fn snapshot(&self) -> ResourceSet {
        self.current.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Resource> {
        self.current.read().await.get(id).cloned()
    }

    /// Error message of the most recent failed refresh, cleared on success
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.as_ref().map(|(_, message)| message.clone())
    }

    /// Receiver that observes every applied set
    pub fn subscribe(&self) -> watch::Receiver<ResourceSet> {
        self.changes.subscribe()
    }
}
