//! Interactive console commands read from stdin.

use std::path::PathBuf;

use crate::container::power::PowerAction;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    Select(String),
    CloseLogs,
    Power(PowerAction, String),
    Filter(Option<String>),
    Export(PathBuf),
    Help,
    Quit,
}

pub const HELP: &str = "\
r                      refresh container list
l <id>                 stream logs of <id>
c                      close the log stream
start|stop|restart <id>
/ <regex>              filter visible log lines (/ alone clears)
export <path>          write visible log lines to a file
h                      this help
q                      quit";

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();

        if let Some(pattern) = line.strip_prefix('/') {
            let pattern = pattern.trim();
            return Ok(Command::Filter((!pattern.is_empty()).then(|| pattern.to_string())));
        }

        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default();
        let arg = parts.next();

        let needs_id = |arg: Option<&str>| {
            arg.map(str::to_string)
                .ok_or_else(|| format!("'{}' needs a container id", verb))
        };

        match verb {
            "r" | "refresh" => Ok(Command::Refresh),
            "l" | "logs" => Ok(Command::Select(needs_id(arg)?)),
            "c" | "close" => Ok(Command::CloseLogs),
            "start" | "stop" | "restart" => {
                let action = verb.parse::<PowerAction>().map_err(|e| e.to_string())?;
                Ok(Command::Power(action, needs_id(arg)?))
            }
            "export" => arg
                .map(|p| Command::Export(PathBuf::from(p)))
                .ok_or_else(|| "'export' needs a file path".to_string()),
            "h" | "help" | "?" => Ok(Command::Help),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command '{}', type h for help", other)),
        }
    }
}
