//! Interactive console
//!
//! Owns the stats pollers and the log session and is their only writer.
//! Registry changes reconcile pollers, stdin commands drive selection and
//! dispatches, and a render tick prints the snapshot whenever it changed.

use anyhow::Context;
use futures::StreamExt;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_stream::wrappers::LinesStream;

use super::command::{Command, HELP};
use crate::config::config::Config;
use crate::container::power::{ActionDispatcher, PowerAction, PowerEvent};
use crate::container::registry::{RefreshOutcome, ResourceRegistry, ResourceSet};
use crate::error::ConsoleError;
use crate::monitor::console::LogStreamSession;
use crate::monitor::stats::{PollerSet, StatsStore};
use crate::remote::client::{ControlPlane, HttpControlPlane};
use crate::view::render;
use crate::view::state::{Snapshot, ViewState};

const LOG_PANE_LINES: usize = 20;

pub fn print_banner(base_url: &str) {
    let ascii_art = format!(
        r#"
     ______        ____
    / ____/___    / __ \____  _____
   / __/ /_  /   / / / / __ \/ ___/
  / /___  / /_  / /_/ / /_/ (__  )
 /_____/ /___/  \____/ .___/____/   console
                    /_/

EzOps console v{}  backend {}
Type h for help.
"#,
        env!("CARGO_PKG_VERSION"),
        base_url
    );

    println!("{}", ascii_art);
}

struct Console {
    control: Arc<dyn ControlPlane>,
    registry: Arc<ResourceRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    pollers: PollerSet,
    session: LogStreamSession,
    view: Arc<ViewState>,
}

impl Console {
    fn new(control: Arc<dyn ControlPlane>, stats_interval: Duration) -> (Self, mpsc::UnboundedReceiver<PowerEvent>) {
        let registry = Arc::new(ResourceRegistry::new(control.clone()));
        let (dispatcher, power_rx) = ActionDispatcher::new(control.clone(), registry.clone());
        let pollers = PollerSet::new(control.clone(), StatsStore::new(), stats_interval);
        let session = LogStreamSession::new(control.clone());
        let view = Arc::new(ViewState::new(registry.clone(), pollers.store(), session.reader()));

        let console = Self {
            control,
            registry,
            dispatcher: Arc::new(dispatcher),
            pollers,
            session,
            view,
        };
        (console, power_rx)
    }

    async fn on_registry_change(&mut self, set: &ResourceSet) {
        self.pollers.reconcile(set).await;
    }

    /// Refresh the registry and probe health without blocking the loop.
    fn spawn_refresh(&self) {
        let registry = self.registry.clone();
        let control = self.control.clone();
        let view = self.view.clone();

        tokio::spawn(async move {
            match registry.refresh().await {
                Ok(RefreshOutcome::Applied { generation, count }) => {
                    tracing::debug!("Console refresh #{} applied ({} containers)", generation, count);
                }
                Ok(RefreshOutcome::Stale { generation }) => {
                    tracing::debug!("Console refresh #{} superseded", generation);
                }
                Err(e) => view.notice(format!("Refresh failed: {}", e)).await,
            }
            view.set_health(control.health().await).await;
        });
    }

    fn spawn_dispatch(&self, action: PowerAction, id: String) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let _ = dispatcher.dispatch(&id, action).await;
        });
    }

    /// Returns false when the console should exit.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Refresh => self.spawn_refresh(),
            Command::Select(id) => {
                if self.registry.get(&id).await.is_some() {
                    self.session.open(&id).await;
                } else {
                    self.view.notice(ConsoleError::UnknownResource(id).to_string()).await;
                }
            }
            Command::CloseLogs => self.session.close().await,
            Command::Power(action, id) => {
                if self.registry.get(&id).await.is_none() {
                    self.view.notice(ConsoleError::UnknownResource(id).to_string()).await;
                } else if !self.view.begin_action(&id) {
                    self.view
                        .notice(format!("An action for {} is still in progress", id))
                        .await;
                } else {
                    self.spawn_dispatch(action, id);
                }
            }
            Command::Filter(pattern) => {
                if let Err(e) = self.view.set_filter(pattern.as_deref()).await {
                    self.view.notice(format!("Invalid filter: {}", e)).await;
                }
            }
            Command::Export(path) => match self.view.export_logs(&path).await {
                Ok(count) => {
                    self.view
                        .notice(format!("Exported {} lines to {}", count, path.display()))
                        .await
                }
                Err(e) => {
                    self.view
                        .notice(format!("Export to {} failed: {}", path.display(), e))
                        .await
                }
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }

    async fn on_power_event(&self, event: PowerEvent) {
        match &event {
            PowerEvent::Dispatching(id, action) => {
                self.view.notice(format!("{} dispatched for {}", action, id)).await;
            }
            PowerEvent::Completed(id, action) => {
                self.view.finish_action(id);
                self.view.notice(format!("{} completed for {}", action, id)).await;
            }
            PowerEvent::Error(id, action, msg) => {
                self.view.finish_action(id);
                self.view.notice(format!("{} failed for {}: {}", action, id, msg)).await;
            }
        }
    }

    async fn shutdown(&mut self) {
        self.session.close().await;
        self.pollers.stop_all().await;
    }
}

async fn tick_opt(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => pending::<()>().await,
    }
}

pub async fn run_console(config: &Config) -> anyhow::Result<()> {
    let control: Arc<dyn ControlPlane> = Arc::new(
        HttpControlPlane::new(config.api.base_url.clone()).context("Failed to build HTTP client")?,
    );
    let (mut console, mut power_rx) = Console::new(control.clone(), config.stats_interval());
    let registry = console.registry.clone();
    let view = console.view.clone();

    print_banner(&config.api.base_url);

    let mut changes = registry.subscribe();
    match registry.refresh().await {
        Ok(_) => {
            if config.logs.follow_first {
                if let Some(first) = registry.snapshot().await.resources.first() {
                    console.session.open(&first.id).await;
                }
            }
        }
        Err(e) => view.notice(format!("Initial refresh failed: {}", e)).await,
    }
    view.set_health(control.health().await).await;

    let mut commands = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut render_tick = interval(config.render_interval());
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh_tick = config.refresh_interval().map(|period| {
        let mut t = interval(period);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t.reset();
        t
    });
    let mut last_frame: Option<Snapshot> = None;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let set = changes.borrow_and_update().clone();
                console.on_registry_change(&set).await;
            }
            Some(event) = power_rx.recv() => {
                console.on_power_event(event).await;
            }
            line = commands.next(), if stdin_open => match line {
                Some(Ok(line)) => match Command::parse(&line) {
                    Ok(command) => {
                        if !console.handle(command).await {
                            break;
                        }
                    }
                    Err(msg) => view.notice(msg).await,
                },
                Some(Err(e)) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
                // Keep monitoring until Ctrl-C when stdin is not interactive.
                None => stdin_open = false,
            },
            _ = render_tick.tick() => {
                let snapshot = view.snapshot().await;
                if last_frame.as_ref() != Some(&snapshot) {
                    print!("\x1B[2J\x1B[H");
                    println!("{}", render::render_console(&snapshot, LOG_PANE_LINES));
                    last_frame = Some(snapshot);
                }
            }
            _ = tick_opt(&mut refresh_tick) => {
                console.spawn_refresh();
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    console.shutdown().await;
    println!("Bye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::{resource, MockControlPlane};

    #[tokio::test(start_paused = true)]
    async fn stop_dispatch_clears_pending_and_stops_poller() {
        let mock = Arc::new(MockControlPlane::new());
        let (mut console, mut power_rx) = Console::new(mock.clone(), Duration::from_secs(5));
        let mut changes = console.registry.subscribe();

        mock.set_containers(vec![resource("a", "Running")]);
        console.registry.refresh().await.unwrap();
        changes.changed().await.unwrap();
        let set = changes.borrow_and_update().clone();
        console.on_registry_change(&set).await;
        assert!(console.pollers.is_polling("a"));

        mock.set_containers(vec![resource("a", "Exited")]);
        assert!(console.handle(Command::Power(PowerAction::Stop, "a".into())).await);
        assert!(console.view.is_pending("a"));

        // A second stop while the first is outstanding is refused.
        assert!(console.handle(Command::Power(PowerAction::Stop, "a".into())).await);

        let dispatching = power_rx.recv().await.unwrap();
        assert_eq!(dispatching, PowerEvent::Dispatching("a".into(), PowerAction::Stop));
        console.on_power_event(dispatching).await;
        assert!(console.view.is_pending("a"));

        let completed = power_rx.recv().await.unwrap();
        assert_eq!(completed, PowerEvent::Completed("a".into(), PowerAction::Stop));
        console.on_power_event(completed).await;
        assert!(!console.view.is_pending("a"));

        changes.changed().await.unwrap();
        let set = changes.borrow_and_update().clone();
        console.on_registry_change(&set).await;
        assert!(!console.pollers.is_polling("a"));
        assert_eq!(mock.power_calls().len(), 1);

        let calls = mock.stats_calls("a");
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(mock.stats_calls("a"), calls);

        console.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_container_is_reported_not_dispatched() {
        let mock = Arc::new(MockControlPlane::new());
        let (mut console, _power_rx) = Console::new(mock.clone(), Duration::from_secs(5));

        assert!(console.handle(Command::Power(PowerAction::Start, "ghost".into())).await);
        assert!(console.handle(Command::Select("ghost".into())).await);
        assert!(!console.handle(Command::Quit).await);

        let notices = console.view.snapshot().await.notices;
        assert_eq!(notices, vec!["unknown resource: ghost", "unknown resource: ghost"]);
        assert!(mock.power_calls().is_empty());
        assert!(mock.stream_opens().is_empty());
    }
}
