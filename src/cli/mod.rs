//! Command-line interface components
//!
//! This module contains CLI-specific code for the Signage Fetcher
//! application, including argument parsing, progress display, and command
//! handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    CheckArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, NextArgs, SyncArgs,
};
pub use commands::{handle_check, handle_config, handle_next, handle_sync};
pub use progress::{spawn_progress, ProgressConfig, ProgressDisplay, ProgressSummary};
