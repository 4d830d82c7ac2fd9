//! Control-plane API client
//!
//! Talks to the backend that owns the containers: listing, point-in-time
//! stats, power actions and the per-container log stream.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use std::collections::VecDeque;

use super::sse::SseDecoder;
use crate::container::power::PowerAction;
use crate::container::state::{BackendHealth, ContainerList, Resource, StatsResponse, StatsSample};
use crate::error::ConsoleError;

/// Stream of log lines for one container. Dropping it closes the transport.
pub type LogStream = BoxStream<'static, Result<String, ConsoleError>>;

/// Everything the console needs from the backend.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// `GET /api/containers`
    async fn list_containers(&self) -> Result<Vec<Resource>, ConsoleError>;

    /// `GET /api/containers/{id}/stats`
    async fn container_stats(&self, id: &str) -> Result<StatsSample, ConsoleError>;

    /// `POST /api/containers/{id}/{start|stop|restart}`
    async fn power(&self, id: &str, action: PowerAction) -> Result<(), ConsoleError>;

    /// `GET /api/containers/{id}/logs` as a server-push stream
    async fn stream_logs(&self, id: &str) -> Result<LogStream, ConsoleError>;

    /// `GET /api/health`
    async fn health(&self) -> Result<BackendHealth, ConsoleError>;
}

pub struct HttpControlPlane {
    base_url: String,
    client: reqwest::Client,
}

impl HttpControlPlane {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConsoleError> {
        // No request timeout: the log stream is long-lived and the other
        // calls use the transport defaults.
        let client = reqwest::Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn list_containers(&self) -> Result<Vec<Resource>, ConsoleError> {
        let list: ContainerList = self
            .client
            .get(self.url("/api/containers"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(metrics) = &list.metrics {
            tracing::debug!(
                "Backend reports {}/{} containers active",
                metrics.active_containers,
                metrics.total_containers
            );
        }
        Ok(list.containers)
    }

    async fn container_stats(&self, id: &str) -> Result<StatsSample, ConsoleError> {
        let stats: StatsResponse = self
            .client
            .get(self.url(&format!("/api/containers/{}/stats", id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(stats.into())
    }

    async fn power(&self, id: &str, action: PowerAction) -> Result<(), ConsoleError> {
        self.client
            .post(self.url(&format!("/api/containers/{}/{}", id, action.as_str())))
            .send()
            .await?
            .error_for_status()?;

        tracing::debug!("Backend accepted {} for {}", action, id);
        Ok(())
    }

    async fn stream_logs(&self, id: &str) -> Result<LogStream, ConsoleError> {
        let response = self
            .client
            .get(self.url(&format!("/api/containers/{}/logs", id)))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConsoleError::Transport(format!(
                "log stream for {} returned status {}",
                id,
                response.status()
            )));
        }

        let body = Box::pin(response.bytes_stream());
        let state = (body, SseDecoder::new(), VecDeque::new());

        let lines = futures::stream::unfold(state, |(mut body, mut decoder, mut pending)| async move {
            loop {
                if let Some(line) = pending.pop_front() {
                    return Some((Ok(line), (body, decoder, pending)));
                }

                match body.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                    Some(Err(e)) => {
                        return Some((Err(ConsoleError::Transport(e.to_string())), (body, decoder, pending)));
                    }
                    None => return None,
                }
            }
        });

        Ok(lines.boxed())
    }

    async fn health(&self) -> Result<BackendHealth, ConsoleError> {
        let health: BackendHealth = self
            .client
            .get(self.url("/api/health"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(health)
    }
}
