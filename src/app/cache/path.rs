//! On-disk naming of cached content
//!
//! Every downloadable item maps to a flat file name in the cache root built
//! from its id, its file hash and its extension:
//!
//! ```text
//! <root>/<content_id><file_hash><extension>     finished file
//! <root>/<content_id><file_hash><extension>_    download in progress
//! <root>/<content_id>/                          unpacked html bundle
//! ```
//!
//! Because the hash is part of the name, a changed file on the server gets a
//! new name and the old copy can keep playing until the swap.

use std::path::{Path, PathBuf};

use crate::app::manifest::{ContentItem, FileRef};
use crate::constants::TEMP_FILE_SUFFIX;

/// Final and in-progress locations for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPaths {
    pub main: PathBuf,
    pub temp: PathBuf,
}

/// Path generation for the flat cache layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<content_id><file_hash><extension>`
    pub fn file_name(content_id: &str, file: &FileRef) -> String {
        format!("{}{}{}", content_id, file.hash, file.extension)
    }

    /// Paths for an item, or `None` if it has nothing to download
    pub fn item_paths(&self, item: &ContentItem) -> Option<ItemPaths> {
        let file = item.file.as_ref()?;
        let main = self.root.join(Self::file_name(&item.id, file));
        Some(ItemPaths {
            temp: Self::temp_path_for(&main),
            main,
        })
    }

    /// In-progress name for a final path
    pub fn temp_path_for(main: &Path) -> PathBuf {
        let mut name = main.as_os_str().to_os_string();
        name.push(TEMP_FILE_SUFFIX);
        PathBuf::from(name)
    }

    /// Directory an html bundle is unpacked into
    pub fn bundle_dir(&self, content_id: &str) -> PathBuf {
        self.root.join(content_id)
    }
}
