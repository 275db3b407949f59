//! relaybot library root.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod logging;
pub mod providers;
pub mod retry;
pub mod telegram;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::Commands;
pub use config::{Settings, SettingsArgs};
pub use error::{Error, Result};
pub use telegram::run_daemon;
