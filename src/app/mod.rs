//! Core application logic for Signage Fetcher
//!
//! This module contains the playback engine: the manifest model, per-area
//! playlist selection, cache reconciliation with resumable downloads, deferred
//! file swapping and the coordinator that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_fetcher::app::{PlaybackConfig, PlaybackContext, PlaylistSelector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = PlaybackConfig::from_file("manifest.json".as_ref()).await?;
//! let context = Arc::new(PlaybackContext::with_system_clock());
//!
//! let area = &manifest.campaigns[0].areas[0];
//! let mut selector = PlaylistSelector::new(area.id.clone(), context.clone());
//! selector.update_items(&area.content);
//!
//! // Nothing is activated until the synchronizer has verified it
//! assert!(selector.next().is_none());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod clock;
pub mod coordinator;
pub mod hash;
pub mod manifest;
pub mod selector;
pub mod state;
pub mod swapper;
pub mod sync;

// Re-export main public API
pub use cache::{CacheConfig, CacheManager};
pub use client::{ClientConfig, HttpTransport, Transport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CoordinatorConfig, PlayerConfig, PlayerCoordinator, PlayerStatus};
pub use hash::Md5Hash;
pub use manifest::{
    parse_manifest, Campaign, ContentItem, ManifestSource, MediaType, PlayType, PlaybackConfig,
};
pub use selector::{AreaPlaylists, PlaylistSelector};
pub use state::PlaybackContext;
pub use swapper::{FileSwapper, SwapConfig, SwapJob};
pub use sync::{ContentSynchronizer, DownloadCheck, SyncConfig, SyncEvent, SyncReport};
