//! Container listing
//!
//! One refresh and health probe, printed as a table.

use anyhow::Context;
use std::sync::Arc;

use crate::config::config::Config;
use crate::container::registry::ResourceRegistry;
use crate::monitor::console::LogStreamSession;
use crate::monitor::stats::StatsStore;
use crate::remote::client::{ControlPlane, HttpControlPlane};
use crate::view::render;
use crate::view::state::ViewState;

pub async fn list_containers(config: &Config) -> anyhow::Result<()> {
    let control: Arc<dyn ControlPlane> = Arc::new(HttpControlPlane::new(config.api.base_url.clone())?);
    let registry = Arc::new(ResourceRegistry::new(control.clone()));

    registry
        .refresh()
        .await
        .with_context(|| format!("Failed to list containers from {}", config.api.base_url))?;

    let session = LogStreamSession::new(control.clone());
    let view = ViewState::new(registry, StatsStore::new(), session.reader());
    view.set_health(control.health().await).await;

    println!();
    println!("{}", render::render_table(&view.snapshot().await));
    println!();
    Ok(())
}
