use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::registry::ResourceRegistry;
use crate::error::ConsoleError;
use crate::remote::client::ControlPlane;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Restart => "restart",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerAction {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(PowerAction::Start),
            "stop" => Ok(PowerAction::Stop),
            "restart" => Ok(PowerAction::Restart),
            other => Err(ConsoleError::Config(format!("unknown action '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PowerEvent {
    Dispatching(String, PowerAction),
    Completed(String, PowerAction),
    Error(String, PowerAction, String),
}

/// Issues start/stop/restart and re-synchronizes the registry afterwards.
///
/// Dispatches are not serialized or deduplicated here; callers that care
/// must keep a second request for the same resource from being submitted.
pub struct ActionDispatcher {
    control: Arc<dyn ControlPlane>,
    registry: Arc<ResourceRegistry>,
    event_tx: mpsc::UnboundedSender<PowerEvent>,
}

impl ActionDispatcher {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        registry: Arc<ResourceRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<PowerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                control,
                registry,
                event_tx,
            },
            event_rx,
        )
    }

    /// Send one control request, then refresh the registry whatever the
    /// outcome. The refresh result is authoritative for the new status.
    pub async fn dispatch(&self, id: &str, action: PowerAction) -> Result<(), ConsoleError> {
        let _ = self.event_tx.send(PowerEvent::Dispatching(id.to_string(), action));
        tracing::info!("Dispatching {} for {}", action, id);

        let result = self.control.power(id, action).await;
        if let Err(e) = &result {
            tracing::error!("Power action {} failed for {}: {}", action, id, e);
        }

        if let Err(e) = self.registry.refresh().await {
            tracing::warn!("Refresh after {} on {} failed: {}", action, id, e);
        }

        let event = match &result {
            Ok(()) => PowerEvent::Completed(id.to_string(), action),
            Err(e) => PowerEvent::Error(id.to_string(), action, e.to_string()),
        };
        let _ = self.event_tx.send(event);

        result
    }
}
