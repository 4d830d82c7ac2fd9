//! Live subscriptions: stats pollers and the log stream session.

pub mod buffer;
pub mod console;
pub mod stats;
