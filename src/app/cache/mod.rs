//! Local content cache
//!
//! This module owns everything that touches the cache directory: where files
//! live, whether the bytes on disk match the manifest, and unpacking html
//! bundles.
//!
//! # Key Features
//!
//! - **OS-specific cache directory**: defaults under the user cache dir
//! - **Hash-addressed names**: `<id><md5><ext>`, with a `_` suffix while downloading
//! - **Streaming verification**: chunked MD5 with a memo keyed by length and mtime
//! - **Bundle extraction**: zip archives unpacked into `<root>/<id>/`
//!
//! # Module Organization
//!
//! - [`config`] - Configuration types and defaults
//! - [`path`] - File naming ([`CacheLayout`])
//! - [`verification`] - Hash verification ([`HashVerifier`])
//! - [`extract`] - Bundle extraction
//!
//! # Examples
//!
//! ```rust,no_run
//! use signage_fetcher::app::cache::{CacheConfig, CacheManager, FileCheck};
//!
//! # async fn example(item: &signage_fetcher::app::manifest::ContentItem) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheManager::new(CacheConfig::default()).await?;
//! if let Some(paths) = cache.layout().item_paths(item) {
//!     let file = item.file.as_ref().unwrap();
//!     match cache.verifier().check(&paths.main, &file.hash).await? {
//!         FileCheck::Verified => println!("{} is cached", item.id),
//!         _ => println!("{} needs a download", item.id),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod extract;
pub mod path;
pub mod verification;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, info};

use crate::constants::files::DEFAULT_CACHE_DIR_NAME;
use crate::errors::{CacheError, CacheResult};

pub use config::CacheConfig;
pub use extract::extract_bundle;
pub use path::{CacheLayout, ItemPaths};
pub use verification::{FileCheck, HashVerifier};

/// Cache directory handle bundling layout and verification
#[derive(Debug)]
pub struct CacheManager {
    config: CacheConfig,
    layout: CacheLayout,
    verifier: HashVerifier,
}

impl CacheManager {
    /// Create a cache manager, creating the root directory if needed
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache directory cannot be created
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let cache_root = match &config.cache_root {
            Some(path) => path.clone(),
            None => Self::get_default_cache_dir()?,
        };

        Self::ensure_directory_exists(&cache_root).await?;
        info!("Using content cache at {}", cache_root.display());

        Ok(Self {
            verifier: HashVerifier::new(config.memoize_hashes, config.hash_chunk_size),
            layout: CacheLayout::new(cache_root),
            config,
        })
    }

    pub fn cache_root(&self) -> &Path {
        self.layout.root()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn verifier(&self) -> &HashVerifier {
        &self.verifier
    }

    /// Default cache directory for the current OS
    ///
    /// - Linux: ~/.cache/signage-fetcher
    /// - macOS: ~/Library/Caches/signage-fetcher
    /// - Windows: %LOCALAPPDATA%/signage-fetcher
    pub fn get_default_cache_dir() -> CacheResult<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| CacheError::DirectoryNotAccessible {
                path: PathBuf::from("system cache directory"),
            })?
            .join(DEFAULT_CACHE_DIR_NAME);
        Ok(cache_dir)
    }

    async fn ensure_directory_exists(path: &Path) -> CacheResult<()> {
        if !path.exists() {
            fs::create_dir_all(path).await.map_err(|e| {
                error!("Failed to create cache directory: {}", e);
                CacheError::DirectoryNotAccessible {
                    path: path.to_path_buf(),
                }
            })?;
            debug!("Created cache directory: {}", path.display());
        }
        Ok(())
    }
}
