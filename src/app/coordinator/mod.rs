//! Player orchestration
//!
//! This module wires the shared playback context, the per-area selectors, the
//! content synchronizer and the file swapper into a single
//! [`PlayerCoordinator`]. It is the layer a playback front end talks to: it
//! applies manifests, runs download passes, rotates campaigns and answers
//! "what next" for each area.
//!
//! # Key Features
//!
//! - **Manifest lifecycle**: a new manifest wholly replaces the old one while
//!   activation and recency state carry over for ids that remain
//! - **Status reporting**: [`PlayerStatus`] tells the front end whether to
//!   show content, a downloading screen, or nothing
//! - **Graceful shutdown**: background loops stop on CTRL-C or SIGTERM
//!
//! # Architecture
//!
//! - [`config`] - Coordinator and player configuration
//! - [`signals`] - Signal handling for graceful shutdown
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_fetcher::app::cache::{CacheConfig, CacheManager};
//! use signage_fetcher::app::client::{ClientConfig, HttpTransport};
//! use signage_fetcher::app::coordinator::{CoordinatorConfig, PlayerCoordinator, PlayerStatus};
//! use signage_fetcher::app::manifest::PlaybackConfig;
//! use signage_fetcher::app::sync::EventSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(CacheManager::new(CacheConfig::default()).await?);
//! let transport = Arc::new(HttpTransport::new(ClientConfig::default())?);
//! let player = PlayerCoordinator::new(
//!     CoordinatorConfig::default(),
//!     cache,
//!     transport,
//!     EventSink::disabled(),
//! );
//!
//! let manifest = PlaybackConfig::from_file("manifest.json".as_ref()).await?;
//! if player.apply_manifest(manifest).await == PlayerStatus::Downloading {
//!     player.run_sync_pass().await;
//! }
//!
//! if let Some(id) = player.next("main") {
//!     println!("play {}", id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod signals;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app::cache::CacheManager;
use crate::app::client::Transport;
use crate::app::clock::SystemClock;
use crate::app::manifest::{Campaign, CampaignRotation, ContentItem, PlaybackConfig};
use crate::app::selector::AreaPlaylists;
use crate::app::state::PlaybackContext;
use crate::app::swapper::FileSwapper;
use crate::app::sync::{ContentSynchronizer, DownloadCheck, EventSink, SyncReport};

pub use config::{CoordinatorConfig, PlayerConfig};
pub use signals::{create_shutdown_channel, spawn_signal_listener};

/// What the front end should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Nothing to play and nothing on its way
    NoContent,
    /// Nothing playable yet, downloads pending
    Downloading,
    /// At least one area has playable content
    Ready,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::NoContent => write!(f, "no content"),
            PlayerStatus::Downloading => write!(f, "downloading"),
            PlayerStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Campaign and per-area selection state, replaced as a whole on manifest updates
struct Selection {
    manifest: Arc<PlaybackConfig>,
    rotation: CampaignRotation,
    playlists: AreaPlaylists,
}

impl Selection {
    fn load_current_campaign(&mut self) {
        match self.rotation.current(&self.manifest) {
            Some(campaign) => self.playlists.load_campaign(campaign),
            None => {
                debug!("No campaign to load, clearing playlists");
                self.playlists.clear();
            }
        }
    }
}

/// Orchestrates selection, synchronization and swapping for one device
///
/// Every method takes `&self`, so the coordinator can sit behind an `Arc`
/// and keep answering [`next`](Self::next) while a download pass runs on
/// another task.
pub struct PlayerCoordinator {
    context: Arc<PlaybackContext>,
    synchronizer: Arc<ContentSynchronizer>,
    swapper: Arc<FileSwapper>,
    selection: Mutex<Selection>,
    last_check: Mutex<DownloadCheck>,
}

impl PlayerCoordinator {
    /// Build a coordinator on the system clock
    pub fn new(
        config: CoordinatorConfig,
        cache: Arc<CacheManager>,
        transport: Arc<dyn Transport>,
        events: EventSink,
    ) -> Self {
        let context = match config.player.utc_offset() {
            Some(offset) => PlaybackContext::new(Arc::new(SystemClock), offset),
            None => PlaybackContext::with_system_clock(),
        };
        Self::with_context(config, Arc::new(context), cache, transport, events)
    }

    /// Build a coordinator around an existing context
    pub fn with_context(
        config: CoordinatorConfig,
        context: Arc<PlaybackContext>,
        cache: Arc<CacheManager>,
        transport: Arc<dyn Transport>,
        events: EventSink,
    ) -> Self {
        context.set_location(config.player.location);

        let swapper = Arc::new(FileSwapper::new(context.clone(), config.swap));
        let synchronizer = Arc::new(
            ContentSynchronizer::new(
                context.clone(),
                cache,
                transport,
                swapper.clone(),
                config.sync.clone(),
            )
            .with_events(events),
        );

        let playlists = match config.player.seed {
            Some(seed) => AreaPlaylists::new(context.clone()).with_seed(seed),
            None => AreaPlaylists::new(context.clone()),
        };

        Self {
            context,
            synchronizer,
            swapper,
            selection: Mutex::new(Selection {
                manifest: Arc::new(PlaybackConfig::default()),
                rotation: CampaignRotation::new(),
                playlists,
            }),
            last_check: Mutex::new(DownloadCheck::default()),
        }
    }

    pub fn context(&self) -> &Arc<PlaybackContext> {
        &self.context
    }

    pub fn synchronizer(&self) -> &Arc<ContentSynchronizer> {
        &self.synchronizer
    }

    pub fn swapper(&self) -> &Arc<FileSwapper> {
        &self.swapper
    }

    pub fn manifest(&self) -> Arc<PlaybackConfig> {
        self.selection.lock().manifest.clone()
    }

    /// Replace the active manifest and reconcile the cache against it
    pub async fn apply_manifest(&self, manifest: PlaybackConfig) -> PlayerStatus {
        let manifest = Arc::new(manifest);
        info!(
            "Applying manifest {} with {} campaigns",
            manifest.hash.as_deref().unwrap_or("(no hash)"),
            manifest.campaigns.len()
        );

        self.synchronizer.update_manifest(manifest.clone());
        {
            let now = self.context.now_local();
            let mut selection = self.selection.lock();
            selection.rotation.start(&manifest, now);
            selection.manifest = manifest;
            selection.load_current_campaign();
        }

        let check = self.synchronizer.check_download().await;
        *self.last_check.lock() = check;
        self.status()
    }

    /// Download everything the last reconciliation queued
    ///
    /// The swapper must be running (see [`spawn_swapper`](Self::spawn_swapper))
    /// or be ticked by the caller, otherwise swapped items never activate.
    /// Selection stays available for the whole pass.
    pub async fn run_sync_pass(&self) -> SyncReport {
        let report = self.synchronizer.run_pass().await;
        let check = self.synchronizer.check_download().await;
        *self.last_check.lock() = check;
        report
    }

    /// Result of the latest reconciliation
    pub fn last_check(&self) -> DownloadCheck {
        *self.last_check.lock()
    }

    pub fn status(&self) -> PlayerStatus {
        let (empty, playable) = {
            let selection = self.selection.lock();
            (
                selection.manifest.is_empty(),
                selection.playlists.any_have_next(),
            )
        };

        if empty {
            PlayerStatus::NoContent
        } else if playable {
            PlayerStatus::Ready
        } else if self.last_check().pending > 0 {
            PlayerStatus::Downloading
        } else {
            PlayerStatus::NoContent
        }
    }

    /// Campaign currently on screen
    pub fn current_campaign(&self) -> Option<Campaign> {
        let selection = self.selection.lock();
        selection.rotation.current(&selection.manifest).cloned()
    }

    /// Rotate to the next valid campaign and return how long it stays on
    pub fn advance_campaign(&self) -> Option<Duration> {
        let now = self.context.now_local();
        let mut selection = self.selection.lock();
        let manifest = selection.manifest.clone();
        let slot = selection.rotation.advance(&manifest, now)?;
        selection.load_current_campaign();
        Some(slot)
    }

    pub fn area_ids(&self) -> Vec<String> {
        self.selection
            .lock()
            .playlists
            .area_ids()
            .map(str::to_string)
            .collect()
    }

    /// Next item id for an area of the current campaign
    pub fn next(&self, area_id: &str) -> Option<String> {
        self.selection.lock().playlists.next(area_id)
    }

    pub fn have_next(&self, area_id: &str) -> bool {
        self.selection.lock().playlists.have_next(area_id)
    }

    pub fn find_item_by_id(&self, area_id: &str, content_id: &str) -> Option<ContentItem> {
        self.selection
            .lock()
            .playlists
            .find_item_by_id(area_id, content_id)
            .cloned()
    }

    /// Report what the front end is showing, or `None` when idle
    pub fn set_currently_playing(&self, content_id: Option<&str>) {
        self.context.set_currently_playing(content_id);
    }

    /// Run the swapper until `shutdown` fires
    pub fn spawn_swapper(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.swapper.clone().run(shutdown))
    }
}

impl fmt::Debug for PlayerCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let campaign = self.selection.lock().rotation.current_index();
        let areas = self.area_ids();
        f.debug_struct("PlayerCoordinator")
            .field("campaign", &campaign)
            .field("areas", &areas)
            .field("last_check", &self.last_check())
            .finish_non_exhaustive()
    }
}
