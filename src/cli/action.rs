use anyhow::Context;
use std::sync::Arc;

use crate::config::config::Config;
use crate::container::power::{ActionDispatcher, PowerAction};
use crate::container::registry::ResourceRegistry;
use crate::remote::client::{ControlPlane, HttpControlPlane};

/// Dispatch one power action and print the status reported by the
/// follow-up refresh.
pub async fn run_action(config: &Config, id: &str, action: PowerAction) -> anyhow::Result<()> {
    let control: Arc<dyn ControlPlane> = Arc::new(HttpControlPlane::new(config.api.base_url.clone())?);
    let registry = Arc::new(ResourceRegistry::new(control.clone()));
    let (dispatcher, _events) = ActionDispatcher::new(control, registry.clone());

    let result = dispatcher.dispatch(id, action).await;

    match registry.get(id).await {
        Some(resource) => println!("{} ({}) is now {}", resource.name, resource.id, resource.status),
        None => match registry.last_error().await {
            Some(err) => println!("Status of {} unknown: {}", id, err),
            None => println!("{} is not listed by the backend", id),
        },
    }

    result.with_context(|| format!("Failed to {} {}", action, id))
}
