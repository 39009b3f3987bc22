//! Cache configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::files;

/// Configuration for the local content cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for content files (OS-specific if None)
    pub cache_root: Option<PathBuf>,
    /// Reuse digests of unchanged files between reconciliation passes
    pub memoize_hashes: bool,
    /// Read buffer size used while hashing
    pub hash_chunk_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            memoize_hashes: true,
            hash_chunk_size: files::HASH_CHUNK_SIZE,
        }
    }
}

impl CacheConfig {
    /// Create a configuration rooted at `cache_root`
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
            ..Default::default()
        }
    }

    /// Enable or disable digest memoization
    pub fn with_memoized_hashes(mut self, enabled: bool) -> Self {
        self.memoize_hashes = enabled;
        self
    }

    /// Set the hashing read buffer size
    pub fn with_hash_chunk_size(mut self, size: usize) -> Self {
        self.hash_chunk_size = size.max(1);
        self
    }
}
