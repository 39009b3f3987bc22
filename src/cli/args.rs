//! Command-line argument parsing for Signage Fetcher
//!
//! This module defines the CLI structure using clap derive macros: cache
//! synchronization, reconciliation checks, playlist simulation and
//! configuration management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Signage Fetcher - keep a signage player's content cache in sync
#[derive(Parser, Debug)]
#[command(
    name = "signage_fetcher",
    version,
    about = "Synchronize signage content and simulate playlist selection",
    long_about = "Keeps a playback device's local media cache in line with a server manifest using
resumable, hash-verified downloads, and simulates the per-area playlist selection a player would make."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the cache with a manifest and download what is missing
    Sync(SyncArgs),

    /// Report which items are cached and which need a download
    Check(CheckArgs),

    /// Simulate playlist selection from the local cache
    Next(NextArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the sync command
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Manifest file path or http(s) URL
    #[arg(short, long, value_name = "PATH|URL")]
    pub manifest: String,

    /// Reload the manifest and sync again every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the check command
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Manifest file path or http(s) URL
    #[arg(short, long, value_name = "PATH|URL")]
    pub manifest: String,

    /// List the ids queued for download
    #[arg(short, long)]
    pub list: bool,
}

/// Arguments for the next command
#[derive(Args, Debug, Clone)]
pub struct NextArgs {
    /// Manifest file path or http(s) URL
    #[arg(short, long, value_name = "PATH|URL")]
    pub manifest: String,

    /// Area to select for (all areas of the current campaign if omitted)
    #[arg(short, long)]
    pub area: Option<String>,

    /// Number of consecutive selections per area
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,

    /// Device latitude for geofenced content
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Device longitude for geofenced content
    #[arg(long, allow_hyphen_values = true)]
    pub long: Option<f64>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Target path (user config directory if omitted)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested by flags, if any
    pub fn log_level_override(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl NextArgs {
    /// Check that coordinates come in pairs and are in range
    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 {
            return Err("--count must be greater than 0".to_string());
        }

        match (self.lat, self.long) {
            (Some(lat), Some(long)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&long) {
                    return Err(format!("Coordinates out of range: {}, {}", lat, long));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            _ => Err("--lat and --long must be given together".to_string()),
        }
    }
}
