//! Log stream session for the selected container
//!
//! A single owned subscription: `open` tears down whatever was streaming,
//! clears the buffer and subscribes to the new container. Every append and
//! state change is checked against the session epoch under the state lock,
//! so a torn-down stream can never write into its successor's buffer.
//!
//! A transport error or a server-side close is terminal. The session goes
//! to `Disconnected` and stays there until the next `open`.

use futures::StreamExt;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::buffer::{LogBuffer, LogLine};
use crate::remote::client::ControlPlane;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connecting,
    Streaming,
    Disconnected,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Connecting => write!(f, "Connecting"),
            Connectivity::Streaming => write!(f, "Streaming"),
            Connectivity::Disconnected => write!(f, "Disconnected"),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    resource_id: Option<String>,
    connectivity: Connectivity,
    buffer: LogBuffer,
    epoch: u64,
    last_error: Option<String>,
}

struct Shared {
    state: RwLock<SessionState>,
    changed: Notify,
}

impl Shared {
    async fn mark_streaming(&self, epoch: u64) -> bool {
        let mut state = self.state.write().await;
        if state.epoch != epoch {
            return false;
        }
        state.connectivity = Connectivity::Streaming;
        drop(state);
        self.changed.notify_waiters();
        true
    }

    async fn append(&self, epoch: u64, text: String) -> bool {
        let mut state = self.state.write().await;
        if state.epoch != epoch {
            return false;
        }
        state.buffer.push(text);
        drop(state);
        self.changed.notify_waiters();
        true
    }

    async fn disconnect(&self, epoch: u64, reason: String) {
        let mut state = self.state.write().await;
        if state.epoch != epoch {
            return;
        }
        state.connectivity = Connectivity::Disconnected;
        state.last_error = Some(reason);
        drop(state);
        self.changed.notify_waiters();
    }
}

/// What the view layer shows for the log pane
#[derive(Debug, Clone, PartialEq)]
pub struct LogView {
    pub resource_id: Option<String>,
    pub connectivity: Connectivity,
    pub lines: Vec<LogLine>,
    pub last_error: Option<String>,
}

/// Read-only handle on the session state
#[derive(Clone)]
pub struct LogReader {
    shared: Arc<Shared>,
}

impl LogReader {
    pub async fn view(&self, filter: Option<&Regex>) -> LogView {
        let state = self.shared.state.read().await;
        LogView {
            resource_id: state.resource_id.clone(),
            connectivity: state.connectivity,
            lines: state.buffer.matching(filter).cloned().collect(),
            last_error: state.last_error.clone(),
        }
    }

    pub async fn connectivity(&self) -> Connectivity {
        self.shared.state.read().await.connectivity
    }

    /// Lines newer than `seq`, oldest first
    pub async fn lines_after(&self, seq: u64) -> Vec<LogLine> {
        let state = self.shared.state.read().await;
        state.buffer.iter().filter(|l| l.seq > seq).cloned().collect()
    }

    /// Resolves on the next append or state change. Create it before reading
    /// the state to avoid missing a wakeup.
    pub fn changed(&self) -> tokio::sync::futures::Notified<'_> {
        self.shared.changed.notified()
    }
}

pub struct LogStreamSession {
    control: Arc<dyn ControlPlane>,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl LogStreamSession {
    pub fn new(control: Arc<dyn ControlPlane>) -> Self {
        let state = SessionState {
            resource_id: None,
            connectivity: Connectivity::Disconnected,
            buffer: LogBuffer::new(),
            epoch: 0,
            last_error: None,
        };

        Self {
            control,
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                changed: Notify::new(),
            }),
            task: None,
        }
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            shared: self.shared.clone(),
        }
    }

    #[allow(unused)]
    pub fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Subscribe to `resource_id`, closing any previous subscription first.
    pub async fn open(&mut self, resource_id: &str) {
        self.close().await;

        let epoch = {
            let mut state = self.shared.state.write().await;
            state.epoch += 1;
            state.buffer.clear();
            state.resource_id = Some(resource_id.to_string());
            state.connectivity = Connectivity::Connecting;
            state.last_error = None;
            state.epoch
        };
        self.shared.changed.notify_waiters();

        info!("Opening log stream for container {}", resource_id);
        self.task = Some(tokio::spawn(Self::stream_loop(
            resource_id.to_string(),
            epoch,
            self.control.clone(),
            self.shared.clone(),
        )));
    }

    /// Tear down the transport. Closing a closed session does nothing.
    pub async fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let resource_id = {
            let mut state = self.shared.state.write().await;
            state.epoch += 1;
            state.connectivity = Connectivity::Disconnected;
            state.resource_id.clone()
        };

        task.abort();
        let _ = task.await;
        self.shared.changed.notify_waiters();

        debug!("Closed log stream for {:?}", resource_id);
    }

    async fn stream_loop(resource_id: String, epoch: u64, control: Arc<dyn ControlPlane>, shared: Arc<Shared>) {
        let mut stream = match control.stream_logs(&resource_id).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Log stream for {} could not be opened: {}", resource_id, e);
                shared.disconnect(epoch, e.to_string()).await;
                return;
            }
        };

        if !shared.mark_streaming(epoch).await {
            return;
        }

        let reason = loop {
            match stream.next().await {
                Some(Ok(line)) => {
                    if !shared.append(epoch, line).await {
                        return;
                    }
                }
                Some(Err(e)) => break e.to_string(),
                None => break "stream closed by server".to_string(),
            }
        };

        drop(stream);
        warn!("Log stream for {} disconnected: {}", resource_id, reason);
        shared.disconnect(epoch, reason).await;
    }
}

impl Drop for LogStreamSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
