//! Html bundle extraction
//!
//! Bundles arrive as zip archives and are unpacked into a per-item
//! directory. Extraction runs on the blocking pool because the `zip` crate
//! is synchronous.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::errors::{CacheError, CacheResult};

/// Unpack `archive` into `destination`, replacing any previous contents
///
/// Returns the number of files written. Entries whose names would escape
/// the destination directory are skipped.
pub async fn extract_bundle(archive: &Path, destination: &Path) -> CacheResult<usize> {
    let archive = archive.to_path_buf();
    let destination = destination.to_path_buf();
    let archive_for_error = archive.clone();

    tokio::task::spawn_blocking(move || extract_blocking(&archive, &destination))
        .await
        .map_err(|e| CacheError::Extraction {
            path: archive_for_error,
            reason: format!("extraction task failed: {}", e),
        })?
}

fn extract_blocking(archive_path: &Path, destination: &Path) -> CacheResult<usize> {
    let extraction_error = |reason: String| CacheError::Extraction {
        path: archive_path.to_path_buf(),
        reason,
    };

    let reader =
        fs::File::open(archive_path).map_err(|e| CacheError::io("open", archive_path, e))?;
    let mut archive = ZipArchive::new(reader).map_err(|e| extraction_error(e.to_string()))?;

    if destination.exists() {
        fs::remove_dir_all(destination)
            .map_err(|e| CacheError::io("remove_dir_all", destination, e))?;
    }
    fs::create_dir_all(destination).map_err(|e| CacheError::io("create_dir", destination, e))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extraction_error(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe bundle entry '{}'", entry.name());
            continue;
        };
        let target: PathBuf = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| CacheError::io("create_dir", &target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io("create_dir", parent, e))?;
        }
        let mut output =
            fs::File::create(&target).map_err(|e| CacheError::io("create", &target, e))?;
        io::copy(&mut entry, &mut output).map_err(|e| CacheError::io("write", &target, e))?;
        written += 1;
    }

    debug!(
        "Extracted {} files from {} into {}",
        written,
        archive_path.display(),
        destination.display()
    );
    Ok(written)
}
