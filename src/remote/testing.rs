//! Scripted control plane for tests.
//!
//! Records every call, lets tests delay or fail individual responses and
//! hands out log feeds whose transport drops are counted.

use async_trait::async_trait;
use chrono::Utc;
use futures::Stream;
use futures::stream::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::client::{ControlPlane, LogStream};
use crate::container::power::PowerAction;
use crate::container::state::{BackendHealth, Resource, ResourceStatus, StatsSample};
use crate::error::ConsoleError;

pub type FeedSender = mpsc::UnboundedSender<Result<String, ConsoleError>>;
type FeedReceiver = mpsc::UnboundedReceiver<Result<String, ConsoleError>>;

pub fn resource(id: &str, status: &str) -> Resource {
    Resource {
        id: id.to_string(),
        name: format!("{}-svc", id),
        image: "nginx:latest".to_string(),
        status: ResourceStatus::from(status.to_string()),
        port: "8080".to_string(),
        uptime: "2024-05-01T10:00:00Z".to_string(),
    }
}

pub fn sample(cpu: &str, mem: &str) -> StatsSample {
    StatsSample {
        cpu: cpu.to_string(),
        mem: mem.to_string(),
        sampled_at: Utc::now(),
    }
}

pub struct MockControlPlane {
    containers: Mutex<Result<Vec<Resource>, ConsoleError>>,
    list_script: Mutex<VecDeque<(Duration, Result<Vec<Resource>, ConsoleError>)>>,
    list_calls: AtomicUsize,
    stats: Mutex<HashMap<String, Result<StatsSample, ConsoleError>>>,
    stats_script: Mutex<VecDeque<(Duration, StatsSample)>>,
    stats_calls: Mutex<Vec<String>>,
    power_result: Mutex<Result<(), ConsoleError>>,
    power_calls: Mutex<Vec<(String, PowerAction)>>,
    feeds: Mutex<HashMap<String, FeedReceiver>>,
    stream_opens: Mutex<Vec<String>>,
    transport_closes: Arc<Mutex<HashMap<String, usize>>>,
    health: Mutex<Result<BackendHealth, ConsoleError>>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(Ok(Vec::new())),
            list_script: Mutex::new(VecDeque::new()),
            list_calls: AtomicUsize::new(0),
            stats: Mutex::new(HashMap::new()),
            stats_script: Mutex::new(VecDeque::new()),
            stats_calls: Mutex::new(Vec::new()),
            power_result: Mutex::new(Ok(())),
            power_calls: Mutex::new(Vec::new()),
            feeds: Mutex::new(HashMap::new()),
            stream_opens: Mutex::new(Vec::new()),
            transport_closes: Arc::new(Mutex::new(HashMap::new())),
            health: Mutex::new(Ok(BackendHealth {
                status: "ok".to_string(),
                docker_connected: true,
            })),
        }
    }

    pub fn set_containers(&self, containers: Vec<Resource>) {
        *self.containers.lock().unwrap() = Ok(containers);
    }

    pub fn fail_list(&self, error: ConsoleError) {
        *self.containers.lock().unwrap() = Err(error);
    }

    /// Queue a one-off listing answered after `delay`
    pub fn script_list(&self, delay: Duration, containers: Vec<Resource>) {
        self.list_script.lock().unwrap().push_back((delay, Ok(containers)));
    }

    /// Queue a one-off listing failure delivered after `delay`
    pub fn script_list_failure(&self, delay: Duration, error: ConsoleError) {
        self.list_script.lock().unwrap().push_back((delay, Err(error)));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_stats(&self, id: &str, cpu: &str, mem: &str) {
        self.stats.lock().unwrap().insert(id.to_string(), Ok(sample(cpu, mem)));
    }

    pub fn fail_stats(&self, id: &str, error: ConsoleError) {
        self.stats.lock().unwrap().insert(id.to_string(), Err(error));
    }

    /// Queue a one-off stats answer (any resource) delivered after `delay`
    pub fn script_stats(&self, delay: Duration, cpu: &str) {
        self.stats_script.lock().unwrap().push_back((delay, sample(cpu, "1MiB")));
    }

    pub fn stats_calls(&self, id: &str) -> usize {
        self.stats_calls.lock().unwrap().iter().filter(|c| c.as_str() == id).count()
    }

    pub fn fail_power(&self, error: ConsoleError) {
        *self.power_result.lock().unwrap() = Err(error);
    }

    pub fn power_calls(&self) -> Vec<(String, PowerAction)> {
        self.power_calls.lock().unwrap().clone()
    }

    /// Register the feed the next log stream for `id` will read from
    pub fn log_feed(&self, id: &str) -> FeedSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().insert(id.to_string(), rx);
        tx
    }

    pub fn stream_opens(&self) -> Vec<String> {
        self.stream_opens.lock().unwrap().clone()
    }

    pub fn transport_closes(&self, id: &str) -> usize {
        self.transport_closes.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn list_containers(&self) -> Result<Vec<Resource>, ConsoleError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.list_script.lock().unwrap().pop_front();
        if let Some((delay, containers)) = scripted {
            tokio::time::sleep(delay).await;
            return containers;
        }
        self.containers.lock().unwrap().clone()
    }

    async fn container_stats(&self, id: &str) -> Result<StatsSample, ConsoleError> {
        self.stats_calls.lock().unwrap().push(id.to_string());

        let scripted = self.stats_script.lock().unwrap().pop_front();
        if let Some((delay, sample)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(sample);
        }
        let configured = self.stats.lock().unwrap().get(id).cloned();
        configured.unwrap_or_else(|| Ok(sample("0.1%", "10MiB")))
    }

    async fn power(&self, id: &str, action: PowerAction) -> Result<(), ConsoleError> {
        self.power_calls.lock().unwrap().push((id.to_string(), action));
        self.power_result.lock().unwrap().clone()
    }

    async fn stream_logs(&self, id: &str) -> Result<LogStream, ConsoleError> {
        self.stream_opens.lock().unwrap().push(id.to_string());

        let feed = self.feeds.lock().unwrap().remove(id);
        match feed {
            Some(rx) => Ok(TrackedStream {
                id: id.to_string(),
                inner: UnboundedReceiverStream::new(rx),
                closes: self.transport_closes.clone(),
            }
            .boxed()),
            None => Err(ConsoleError::Transport(format!("no log feed for {}", id))),
        }
    }

    async fn health(&self) -> Result<BackendHealth, ConsoleError> {
        self.health.lock().unwrap().clone()
    }
}

/// Log stream that counts how often its transport is released
struct TrackedStream {
    id: String,
    inner: UnboundedReceiverStream<Result<String, ConsoleError>>,
    closes: Arc<Mutex<HashMap<String, usize>>>,
}

impl Stream for TrackedStream {
    type Item = Result<String, ConsoleError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if let Ok(mut closes) = self.closes.lock() {
            *closes.entry(self.id.clone()).or_insert(0) += 1;
        }
    }
}
