//! Configuration management for Signage Fetcher
//!
//! This module provides unified configuration management with first-run
//! initialization, multi-source loading, and zero-config defaults. Every
//! section of the TOML file is optional; missing keys fall back to the
//! defaults in [`crate::constants`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::manifest::GeoPoint;
use crate::app::{
    CacheConfig, ClientConfig, CoordinatorConfig, PlayerConfig, SwapConfig, SyncConfig,
};
use crate::constants::{files, http, logging, swap, sync};
use crate::errors::{ConfigError, ConfigResult, Result};

const CONFIG_FILE_NAME: &str = "signage-fetcher.toml";
const CONFIG_DIR_NAME: &str = "signage-fetcher";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Content cache settings
    pub cache: CacheConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Download synchronization settings
    pub sync: SyncConfigToml,
    /// File swapper settings
    pub swap: SwapConfigToml,
    /// Device-specific playback settings
    pub player: PlayerConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Cache directory path
    pub cache_root: Option<PathBuf>,
    /// Remember file digests between reconciliation passes
    pub memoize_hashes: bool,
    /// Read size for hashing, in bytes
    pub hash_chunk_size: usize,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            cache_root: None,
            memoize_hashes: true,
            hash_chunk_size: files::HASH_CHUNK_SIZE,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Longest gap between body chunks in seconds
    pub read_timeout_secs: u64,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// TCP keep-alive in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: http::READ_TIMEOUT.as_secs(),
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            tcp_keepalive_secs: Some(30),
            user_agent: http::USER_AGENT.to_string(),
        }
    }
}

/// TOML-friendly synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfigToml {
    /// Wait before retrying after a transport failure, in seconds
    pub reconnect_backoff_secs: u64,
    /// Delay between a finished download and its activation, in seconds
    pub activation_grace_secs: u64,
    /// Verification failures tolerated per item and pass
    pub integrity_retries: u32,
}

impl Default for SyncConfigToml {
    fn default() -> Self {
        Self {
            reconnect_backoff_secs: sync::RECONNECT_BACKOFF.as_secs(),
            activation_grace_secs: sync::ACTIVATION_GRACE.as_secs(),
            integrity_retries: sync::INTEGRITY_RETRIES,
        }
    }
}

/// TOML-friendly swapper configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwapConfigToml {
    /// Swap check period in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for SwapConfigToml {
    fn default() -> Self {
        Self {
            tick_interval_ms: swap::TICK_INTERVAL.as_millis() as u64,
        }
    }
}

/// TOML-friendly player configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PlayerConfigToml {
    /// Offset of local time from UTC in minutes (unset = host setting)
    pub utc_offset_minutes: Option<i32>,
    /// Device latitude in degrees
    pub latitude: Option<f64>,
    /// Device longitude in degrees
    pub longitude: Option<f64>,
    /// Shuffle seed for reproducible playlists
    pub seed: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

/// Runtime configuration derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub cache: CacheConfig,
    pub client: ClientConfig,
    pub coordinator: CoordinatorConfig,
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> ConfigResult<RuntimeConfig> {
        let client = self.client.to_runtime_config();
        let sync = self.sync.to_runtime_config(client.read_timeout);
        Ok(RuntimeConfig {
            cache: self.cache.to_runtime_config()?,
            coordinator: CoordinatorConfig::default()
                .with_sync(sync)
                .with_swap(self.swap.to_runtime_config()?)
                .with_player(self.player.to_runtime_config()?),
            client,
        })
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, or the first one found)
    ///
    /// CLI arguments are applied on top by the caller.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config file if none exists yet
    ///
    /// Returns the path of the (new or existing) user config file.
    pub async fn initialize_first_run() -> Result<PathBuf> {
        let config_path = Self::get_default_config_path()?;
        if config_path.exists() {
            return Ok(config_path);
        }

        Self::write_default_config(&config_path).await?;
        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(config_path)
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default_config(path: &Path) -> Result<()> {
        info!("Creating default configuration file at {}", path.display());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, Self::generate_default_config_content()).await?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            // Project-local config
            PathBuf::from(format!("./{}", CONFIG_FILE_NAME)),
            PathBuf::from("./config.toml"),
        ];
        // User config
        if let Ok(path) = Self::get_default_config_path() {
            search_paths.push(path);
        }
        // System config (Unix only)
        #[cfg(unix)]
        search_paths.push(PathBuf::from(format!("/etc/{}/config.toml", CONFIG_DIR_NAME)));

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_dir".to_string(),
            value: String::new(),
            reason: "Could not determine user config directory".to_string(),
        })?;

        Ok(config_dir.join(CONFIG_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Signage Fetcher Configuration
# Every key is optional; removed keys fall back to the built-in defaults.

[cache]
# Cache directory (leave unset to use the system cache directory)
# cache_root = "/var/lib/signage/cache"

# Remember file digests so unchanged files are not rehashed every pass
memoize_hashes = true
hash_chunk_size = {chunk}

[client]
connect_timeout_secs = {connect}
# Longest gap between two received chunks before a transfer is retried
read_timeout_secs = {read}
pool_idle_timeout_secs = {idle}
tcp_keepalive_secs = 30
user_agent = "{agent}"

[sync]
# Fixed wait before retrying after a network failure (no attempt limit)
reconnect_backoff_secs = {backoff}
# Delay between a finished download and marking it playable
activation_grace_secs = {grace}
# Fresh downloads of one item that may fail verification per pass
integrity_retries = {integrity}

[swap]
# How often a pending file replacement is retried while its item plays
tick_interval_ms = {tick}

[player]
# utc_offset_minutes = 60
# latitude = 52.52
# longitude = 13.405
# seed = 42

[logging]
level = "{level}"  # error, warn, info, debug, trace
colored_output = true
"#,
            chunk = files::HASH_CHUNK_SIZE,
            connect = http::CONNECT_TIMEOUT.as_secs(),
            read = http::READ_TIMEOUT.as_secs(),
            idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            agent = http::USER_AGENT,
            backoff = sync::RECONNECT_BACKOFF.as_secs(),
            grace = sync::ACTIVATION_GRACE.as_secs(),
            integrity = sync::INTEGRITY_RETRIES,
            tick = swap::TICK_INTERVAL.as_millis(),
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig
    pub fn to_runtime_config(&self) -> ConfigResult<CacheConfig> {
        if self.hash_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.hash_chunk_size".to_string(),
                value: "0".to_string(),
                reason: "Must be at least one byte".to_string(),
            });
        }
        Ok(CacheConfig {
            cache_root: self.cache_root.clone(),
            memoize_hashes: self.memoize_hashes,
            hash_chunk_size: self.hash_chunk_size,
        })
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

impl SyncConfigToml {
    /// Convert to runtime SyncConfig, sharing the client's read timeout
    pub fn to_runtime_config(&self, read_timeout: Duration) -> SyncConfig {
        SyncConfig::default()
            .with_reconnect_backoff(Duration::from_secs(self.reconnect_backoff_secs))
            .with_activation_grace(Duration::from_secs(self.activation_grace_secs))
            .with_integrity_retries(self.integrity_retries)
            .with_read_timeout(read_timeout)
    }
}

impl SwapConfigToml {
    /// Convert to runtime SwapConfig
    pub fn to_runtime_config(&self) -> ConfigResult<SwapConfig> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "swap.tick_interval_ms".to_string(),
                value: "0".to_string(),
                reason: "The swap tick needs a non-zero period".to_string(),
            });
        }
        Ok(SwapConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        })
    }
}

impl PlayerConfigToml {
    /// Convert to runtime PlayerConfig
    pub fn to_runtime_config(&self) -> ConfigResult<PlayerConfig> {
        if let Some(minutes) = self.utc_offset_minutes {
            if minutes.abs() >= 24 * 60 {
                return Err(ConfigError::InvalidValue {
                    field: "player.utc_offset_minutes".to_string(),
                    value: minutes.to_string(),
                    reason: "Offset must be less than a day".to_string(),
                });
            }
        }

        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(ConfigError::InvalidValue {
                        field: "player.latitude/longitude".to_string(),
                        value: format!("{}, {}", latitude, longitude),
                        reason: "Coordinates out of range".to_string(),
                    });
                }
                Some(GeoPoint::new(latitude, longitude))
            }
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "player.latitude/longitude".to_string(),
                    value: format!("{:?}, {:?}", self.latitude, self.longitude),
                    reason: "Set both latitude and longitude or neither".to_string(),
                })
            }
        };

        Ok(PlayerConfig {
            utc_offset_minutes: self.utc_offset_minutes,
            location,
            seed: self.seed,
        })
    }
}
