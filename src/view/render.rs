//! Plain-terminal rendering of a `Snapshot`.

use super::state::{ResourceRow, Snapshot};
use crate::monitor::console::Connectivity;

const WIDTH: usize = 100;

fn bar(left: char, fill: char, right: char) -> String {
    let mut s = String::with_capacity(WIDTH + 2);
    s.push(left);
    s.extend(std::iter::repeat_n(fill, WIDTH));
    s.push(right);
    s
}

fn boxed(text: &str) -> String {
    format!("║ {:<width$} ║", truncate(text, WIDTH - 2), width = WIDTH - 2)
}

/// Truncate to `max_len` characters, marking the cut with "..."
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn row_line(row: &ResourceRow) -> String {
    let r = &row.resource;
    let (cpu, mem) = match &row.stats {
        Some(sample) => (sample.cpu.as_str(), sample.mem.as_str()),
        None => ("-", "-"),
    };
    let status = if row.pending {
        format!("{} …", r.status)
    } else {
        r.status.to_string()
    };

    format!(
        "{:<18} {:<12} {:<22} {:<10} {:<6} {:<8} {:<18} {}",
        truncate(&r.name, 18),
        truncate(&r.id, 12),
        truncate(&r.image, 22),
        truncate(&status, 10),
        truncate(&r.port, 6),
        truncate(cpu, 8),
        truncate(mem, 18),
        r.uptime_display(),
    )
}

/// Container table with the overview header, as printed by `--list`.
pub fn render_table(snapshot: &Snapshot) -> String {
    let mut out = Vec::new();

    out.push(bar('╔', '═', '╗'));
    out.push(boxed(&format!(
        "CONTAINERS  active {}/{}  backend: {}",
        snapshot.overview.active, snapshot.overview.total, snapshot.backend
    )));
    if let Some(err) = &snapshot.registry_error {
        out.push(boxed(&format!("refresh failed: {} (showing last known list)", err)));
    }
    out.push(bar('╚', '═', '╝'));

    if snapshot.rows.is_empty() {
        out.push("  No containers found.".to_string());
        return out.join("\n");
    }

    out.push(format!(
        "{:<18} {:<12} {:<22} {:<10} {:<6} {:<8} {:<18} {}",
        "NAME", "ID", "IMAGE", "STATUS", "PORT", "CPU", "RAM", "UPTIME/INIT"
    ));
    for row in &snapshot.rows {
        out.push(row_line(row));
    }

    out.join("\n")
}

/// Full console frame: container table, log pane with the last
/// `log_lines` visible lines, then notices.
pub fn render_console(snapshot: &Snapshot, log_lines: usize) -> String {
    let mut out = vec![render_table(snapshot), String::new()];

    let marker = match snapshot.logs.connectivity {
        Connectivity::Streaming => "●",
        Connectivity::Connecting => "◌",
        Connectivity::Disconnected => "○",
    };
    let target = snapshot.logs.resource_id.as_deref().unwrap_or("none");
    let mut header = format!("LOGS  {}  {} {}", target, marker, snapshot.logs.connectivity);
    if let Some(filter) = &snapshot.filter {
        header.push_str(&format!("  filter: /{}/", filter));
    }

    out.push(bar('╔', '═', '╗'));
    out.push(boxed(&header));
    if snapshot.logs.connectivity == Connectivity::Disconnected {
        if let Some(reason) = &snapshot.logs.last_error {
            out.push(boxed(&format!("reason: {} (select again with 'l <id>')", reason)));
        }
    }
    out.push(bar('╚', '═', '╝'));

    let lines = &snapshot.logs.lines;
    if lines.is_empty() && snapshot.logs.connectivity != Connectivity::Disconnected {
        out.push("  Waiting for logs...".to_string());
    }
    let skip = lines.len().saturating_sub(log_lines);
    for line in &lines[skip..] {
        out.push(format!("  {}", line.text));
    }

    if !snapshot.notices.is_empty() {
        out.push(String::new());
        for notice in &snapshot.notices {
            out.push(format!("» {}", notice));
        }
    }

    out.join("\n")
}
