//! Follow the log stream of one container on stdout.

use anyhow::Context;
use regex::Regex;
use std::sync::Arc;

use crate::config::config::Config;
use crate::monitor::console::{Connectivity, LogReader, LogStreamSession};
use crate::remote::client::{ControlPlane, HttpControlPlane};

pub async fn follow_logs(config: &Config, id: &str, filter: Option<&str>) -> anyhow::Result<()> {
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("Invalid --filter pattern")?;

    let control: Arc<dyn ControlPlane> = Arc::new(HttpControlPlane::new(config.api.base_url.clone())?);
    let mut session = LogStreamSession::new(control);
    let reader = session.reader();
    session.open(id).await;

    let outcome = tokio::select! {
        outcome = print_until_disconnected(&reader, filter.as_ref()) => outcome,
        _ = tokio::signal::ctrl_c() => None,
    };
    session.close().await;

    if let Some(reason) = outcome {
        eprintln!("Disconnected: {}", reason);
    }
    Ok(())
}

/// Print lines as they arrive; returns the disconnect reason.
async fn print_until_disconnected(reader: &LogReader, filter: Option<&Regex>) -> Option<String> {
    let mut last_seq = 0;

    loop {
        let changed = reader.changed();

        for line in reader.lines_after(last_seq).await {
            last_seq = line.seq;
            if filter.is_none_or(|re| re.is_match(&line.text)) {
                println!("{}", line.text);
            }
        }

        if reader.connectivity().await == Connectivity::Disconnected {
            return Some(reader.view(None).await.last_error.unwrap_or_default());
        }

        changed.await;
    }
}
