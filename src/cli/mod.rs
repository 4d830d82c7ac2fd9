pub mod action;
pub mod command;
pub mod list;
pub mod logs;
pub mod monitor;
