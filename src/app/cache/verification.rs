//! Streaming hash verification with memoization
//!
//! Content files can be hundreds of megabytes, and every reconciliation pass
//! checks every cached file. Digests are therefore computed by streaming the
//! file through MD5 in fixed-size chunks, and remembered per path together
//! with the file's length and modification time. A memoized digest is reused
//! only while both are unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

use crate::app::hash::Md5Hash;
use crate::constants::files::HASH_CHUNK_SIZE;
use crate::errors::{CacheError, CacheResult};

#[derive(Debug, Clone, Copy)]
struct MemoEntry {
    modified: SystemTime,
    len: u64,
    digest: Md5Hash,
}

/// Outcome of checking a file against its expected digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCheck {
    /// No file at the path
    Missing,
    /// File exists and matches
    Verified,
    /// File exists with different content
    Mismatch { actual: Md5Hash, len: u64 },
}

/// MD5 verifier with a per-path digest memo
#[derive(Debug)]
pub struct HashVerifier {
    memo: Mutex<HashMap<PathBuf, MemoEntry>>,
    memoize: bool,
    chunk_size: usize,
}

impl Default for HashVerifier {
    fn default() -> Self {
        Self::new(true, HASH_CHUNK_SIZE)
    }
}

impl HashVerifier {
    pub fn new(memoize: bool, chunk_size: usize) -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
            memoize,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Digest the file at `path`
    pub async fn digest(&self, path: &Path) -> CacheResult<Md5Hash> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| CacheError::io("stat", path, e))?;
        let len = metadata.len();
        let modified = metadata.modified().ok();

        if self.memoize {
            if let Some(modified) = modified {
                if let Some(entry) = self.memo.lock().get(path) {
                    if entry.modified == modified && entry.len == len {
                        trace!("Reusing digest for {}", path.display());
                        return Ok(entry.digest);
                    }
                }
            }
        }

        let digest = self.compute(path).await?;

        if self.memoize {
            if let Some(modified) = modified {
                self.memo.lock().insert(
                    path.to_path_buf(),
                    MemoEntry {
                        modified,
                        len,
                        digest,
                    },
                );
            }
        }

        Ok(digest)
    }

    /// Compare the file at `path` with `expected`
    pub async fn check(&self, path: &Path, expected: &Md5Hash) -> CacheResult<FileCheck> {
        let len = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileCheck::Missing),
            Err(e) => return Err(CacheError::io("stat", path, e)),
        };

        let actual = self.digest(path).await?;
        if actual == *expected {
            Ok(FileCheck::Verified)
        } else {
            debug!(
                "Hash mismatch for {}: expected {}, got {}",
                path.display(),
                expected,
                actual
            );
            Ok(FileCheck::Mismatch { actual, len })
        }
    }

    /// Forget the memoized digest for `path`
    pub fn invalidate(&self, path: &Path) {
        self.memo.lock().remove(path);
    }

    /// Keep only memoized digests whose path satisfies `keep`
    pub fn retain(&self, mut keep: impl FnMut(&Path) -> bool) {
        let mut memo = self.memo.lock();
        let before = memo.len();
        memo.retain(|path, _| keep(path));
        let dropped = before - memo.len();
        if dropped > 0 {
            debug!("Dropped {} stale digests", dropped);
        }
    }

    /// Number of memoized digests
    pub fn memo_len(&self) -> usize {
        self.memo.lock().len()
    }

    async fn compute(&self, path: &Path) -> CacheResult<Md5Hash> {
        let mut file = File::open(path)
            .await
            .map_err(|e| CacheError::io("open", path, e))?;
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|e| CacheError::HashComputation {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            if read == 0 {
                break;
            }
            context.consume(&buffer[..read]);
        }

        Ok(Md5Hash::from(context.compute()))
    }
}
