//! Command-line inbox for the Radar messaging backend
//!
//! Wires the REST adapter, the unread reconciler and the session driver
//! together behind a small CLI.

pub mod config;
pub mod realtime;
pub mod reporter;

pub use config::{Cli, Command, InboxConfig};
pub use realtime::PollingOnly;
pub use reporter::CliReporter;
