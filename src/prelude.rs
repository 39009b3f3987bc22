//! Prelude module for Signage Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use signage_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use signage_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let cache = Arc::new(CacheManager::new(CacheConfig::default()).await?);
//!     let transport = Arc::new(HttpTransport::new(ClientConfig::default())?);
//!     let player = PlayerCoordinator::new(
//!         CoordinatorConfig::default(),
//!         cache,
//!         transport,
//!         EventSink::disabled(),
//!     );
//!
//!     let manifest = PlaybackConfig::from_file(Path::new("manifest.json")).await?;
//!     player.apply_manifest(manifest).await;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Cache and transport
    CacheConfig,
    CacheManager,
    ClientConfig,
    HttpTransport,
    Transport,

    // Core orchestration
    CoordinatorConfig,
    PlayerCoordinator,
    PlayerStatus,
    SyncConfig,
    SyncEvent,
    SyncReport,

    // Manifest model
    ContentItem,
    ManifestSource,
    Md5Hash,
    PlayType,
    PlaybackConfig,
    PlaybackContext,
};
pub use crate::app::sync::EventSink;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
