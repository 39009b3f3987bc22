//! Signage Fetcher CLI application
//!
//! Command-line interface for keeping a signage player's content cache in
//! sync with its server manifest and for simulating playlist selection.

use std::process;

use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use signage_fetcher::cli::{
    handle_check, handle_config, handle_next, handle_sync, Cli, Commands,
};
use signage_fetcher::config::AppConfig;
use signage_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Configuration is loaded before logging so the file can set the level
    let config = AppConfig::load(cli.global.config.clone()).await?;
    init_logging(&cli, &config);

    info!("Signage Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.global.config.is_none() && !matches!(cli.command, Commands::Config(_)) {
        if let Err(e) = AppConfig::initialize_first_run().await {
            warn!("Could not create default configuration file: {}", e);
        }
    }

    let cache_dir = cli.global.cache_dir.as_deref();
    match cli.command {
        Commands::Sync(args) => {
            info!("Executing sync command");
            handle_sync(args, &config, cache_dir).await
        }
        Commands::Check(args) => {
            info!("Executing check command");
            handle_check(args, &config, cache_dir).await
        }
        Commands::Next(args) => {
            info!("Executing next command");
            handle_next(args, &config, cache_dir).await
        }
        Commands::Config(args) => handle_config(args, &config).await,
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let log_level = cli
        .log_level_override()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| config.logging.level.clone());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("signage_fetcher={}", log_level)))
        .unwrap_or_else(|_| EnvFilter::new("signage_fetcher=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.logging.colored_output)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        debug!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
