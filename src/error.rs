//! Error taxonomy for the console core.
//!
//! Transport failures are network/connection level (refused connection,
//! dropped stream, non-success status). Protocol failures are bodies that
//! arrived but could not be understood.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsoleError {
    /// Network or connection-level failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed or unexpected response body
    #[error("protocol failure: {0}")]
    Protocol(String),

    /// Configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// The resource id is not part of the current set
    #[error("unknown resource: {0}")]
    UnknownResource(String),
}

impl ConsoleError {
    #[allow(unused)]
    pub fn is_transport(&self) -> bool {
        matches!(self, ConsoleError::Transport(_))
    }

    #[allow(unused)]
    pub fn is_protocol(&self) -> bool {
        matches!(self, ConsoleError::Protocol(_))
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ConsoleError::Protocol(e.to_string())
        } else {
            ConsoleError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Protocol(e.to_string())
    }
}
