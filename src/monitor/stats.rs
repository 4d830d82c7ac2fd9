//! Stats pollers for running containers
//!
//! One poller per running container samples `/stats` on a fixed period.
//! Each tick issues its request on its own task, so a slow response never
//! delays the next tick; the store keeps whichever sample completed last.
//! Failures keep the previous sample and are retried on the next tick.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::container::registry::ResourceSet;
use crate::container::state::StatsSample;
use crate::remote::client::ControlPlane;

/// Latest completed sample per container
#[derive(Clone, Default)]
pub struct StatsStore {
    samples: Arc<RwLock<HashMap<String, StatsSample>>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(unused)]
    pub async fn get(&self, id: &str) -> Option<StatsSample> {
        self.samples.read().await.get(id).cloned()
    }

    pub async fn all(&self) -> HashMap<String, StatsSample> {
        self.samples.read().await.clone()
    }

    /// Store a sample unless its poller has been stopped. The check and the
    /// write happen under the same lock that `fence` takes.
    async fn record(&self, id: &str, sample: StatsSample, stopped: &AtomicBool) -> bool {
        let mut samples = self.samples.write().await;
        if stopped.load(Ordering::Acquire) {
            return false;
        }
        samples.insert(id.to_string(), sample);
        true
    }

    /// Mark a poller stopped; no record for it can land after this returns.
    async fn fence(&self, stopped: &AtomicBool) {
        let _samples = self.samples.write().await;
        stopped.store(true, Ordering::Release);
    }

    async fn retain(&self, keep: impl Fn(&str) -> bool) {
        self.samples.write().await.retain(|id, _| keep(id));
    }
}

pub struct StatsPoller {
    resource_id: String,
    stopped: Arc<AtomicBool>,
    store: StatsStore,
    task: JoinHandle<()>,
}

impl StatsPoller {
    /// Start sampling immediately, then every `period`.
    pub fn start(
        resource_id: String,
        control: Arc<dyn ControlPlane>,
        store: StatsStore,
        period: Duration,
    ) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(Self::poll_loop(
            resource_id.clone(),
            control,
            store.clone(),
            stopped.clone(),
            period,
        ));

        info!("Starting stats poller for container {}", resource_id);
        Self {
            resource_id,
            stopped,
            store,
            task,
        }
    }

    /// Stop the timer and cancel in-flight requests. Late completions are
    /// discarded even if a request slips past cancellation.
    pub async fn stop(mut self) {
        self.store.fence(&self.stopped).await;
        self.task.abort();
        let _ = (&mut self.task).await;
        info!("Stopped stats poller for container {}", self.resource_id);
    }

    async fn poll_loop(
        resource_id: String,
        control: Arc<dyn ControlPlane>,
        store: StatsStore,
        stopped: Arc<AtomicBool>,
        period: Duration,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Dropping the set aborts every outstanding request.
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if stopped.load(Ordering::Acquire) {
                        break;
                    }
                    in_flight.spawn(Self::sample_once(
                        resource_id.clone(),
                        control.clone(),
                        store.clone(),
                        stopped.clone(),
                    ));
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }
    }

    async fn sample_once(
        resource_id: String,
        control: Arc<dyn ControlPlane>,
        store: StatsStore,
        stopped: Arc<AtomicBool>,
    ) {
        if stopped.load(Ordering::Acquire) {
            return;
        }

        match control.container_stats(&resource_id).await {
            Ok(sample) => {
                if !store.record(&resource_id, sample, &stopped).await {
                    debug!("Ignoring stats for {} received after teardown", resource_id);
                }
            }
            Err(e) => {
                warn!("Stats error for {}: {} (keeping last sample)", resource_id, e);
            }
        }
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.task.abort();
    }
}

/// Keeps exactly one poller per running container of the current set.
pub struct PollerSet {
    control: Arc<dyn ControlPlane>,
    store: StatsStore,
    period: Duration,
    pollers: HashMap<String, StatsPoller>,
}

impl PollerSet {
    pub fn new(control: Arc<dyn ControlPlane>, store: StatsStore, period: Duration) -> Self {
        Self {
            control,
            store,
            period,
            pollers: HashMap::new(),
        }
    }

    /// Start pollers for newly running containers, stop the ones whose
    /// container stopped running or vanished, and forget samples of vanished
    /// containers.
    pub async fn reconcile(&mut self, set: &ResourceSet) {
        let running: HashSet<&str> = set.running_ids().collect();

        let finished: Vec<String> = self
            .pollers
            .keys()
            .filter(|id| !running.contains(id.as_str()))
            .cloned()
            .collect();
        for id in finished {
            if let Some(poller) = self.pollers.remove(&id) {
                poller.stop().await;
            }
        }

        for id in running {
            if !self.pollers.contains_key(id) {
                let poller = StatsPoller::start(
                    id.to_string(),
                    self.control.clone(),
                    self.store.clone(),
                    self.period,
                );
                self.pollers.insert(id.to_string(), poller);
            }
        }

        self.store.retain(|id| set.get(id).is_some()).await;
    }

    pub async fn stop_all(&mut self) {
        for (_, poller) in self.pollers.drain() {
            poller.stop().await;
        }
    }

    #[allow(unused)]
    pub fn is_polling(&self, id: &str) -> bool {
        self.pollers.contains_key(id)
    }

    #[allow(unused)]
    pub fn len(&self) -> usize {
        self.pollers.len()
    }

    #[allow(unused)]
    pub fn is_empty(&self) -> bool {
        self.pollers.is_empty()
    }

    pub fn store(&self) -> StatsStore {
        self.store.clone()
    }
}
