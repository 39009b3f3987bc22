//! Content synchronization
//!
//! The [`ContentSynchronizer`] keeps the cache directory in line with the
//! active manifest. Reconciliation ([`ContentSynchronizer::check_download`])
//! activates every item whose file is already on disk with the right hash and
//! queues the rest; a pass ([`ContentSynchronizer::run_pass`]) then works the
//! queue strictly one transfer at a time.
//!
//! # Key Features
//!
//! - **Resumable transfers**: partial files are kept across failures and
//!   continued with range requests
//! - **Integrity first**: nothing is activated before its MD5 matches
//! - **Unbounded retry**: transport failures are retried after a fixed back-off
//! - **No-downtime replacement**: finished files go through the
//!   [`FileSwapper`](crate::app::swapper::FileSwapper) so a playing file is
//!   never pulled away
//!
//! # Module Organization
//!
//! - [`config`] - Timing configuration ([`SyncConfig`])
//! - [`events`] - Progress and lifecycle notifications ([`SyncEvent`])
//! - [`queue`] - Download ordering
//! - [`transfer`] - Single resumable transfer attempt
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_fetcher::app::cache::{CacheConfig, CacheManager};
//! use signage_fetcher::app::client::{ClientConfig, HttpTransport};
//! use signage_fetcher::app::manifest::PlaybackConfig;
//! use signage_fetcher::app::state::PlaybackContext;
//! use signage_fetcher::app::swapper::{FileSwapper, SwapConfig};
//! use signage_fetcher::app::sync::{ContentSynchronizer, SyncConfig};
//!
//! # async fn example(manifest: PlaybackConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let context = Arc::new(PlaybackContext::with_system_clock());
//! let cache = Arc::new(CacheManager::new(CacheConfig::default()).await?);
//! let transport = Arc::new(HttpTransport::new(ClientConfig::default())?);
//! let swapper = Arc::new(FileSwapper::new(context.clone(), SwapConfig::default()));
//!
//! let sync = ContentSynchronizer::new(context, cache, transport, swapper, SyncConfig::default());
//! sync.update_manifest(Arc::new(manifest));
//!
//! let check = sync.check_download().await;
//! println!("{} to download, {} ready", check.pending, check.ready);
//!
//! let report = sync.run_pass().await;
//! println!("{} completed, {} failed", report.completed.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod events;
pub mod queue;
pub mod transfer;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::cache::{extract_bundle, CacheManager, FileCheck, ItemPaths};
use crate::app::client::Transport;
use crate::app::manifest::{ContentItem, PlaybackConfig};
use crate::app::state::PlaybackContext;
use crate::app::swapper::{FileSwapper, SwapJob, SwapTicket};
use crate::errors::{CacheError, DownloadError, DownloadResult};

pub use config::SyncConfig;
pub use events::{EventSink, SyncEvent};
pub use queue::order_download_queue;
pub use transfer::{TempFileState, TransferOutcome};

/// Result of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadCheck {
    /// Items queued for download
    pub pending: usize,
    /// Items activated from the cache (or needing no file)
    pub ready: usize,
}

impl DownloadCheck {
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

/// Summary of one pass over the download queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Ids activated by this pass, in completion order
    pub completed: Vec<String>,
    /// Ids given up for this pass with the reason
    pub failed: Vec<(String, String)>,
    /// Bytes received over the network
    pub bytes_downloaded: u64,
    /// Transfers continued from a partial file
    pub resumed: usize,
    /// Transport failures that were retried
    pub retries: usize,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Finished {
    /// Waiting for the swapper to put the file in place
    Swap(SwapTicket),
    /// Already in place
    InPlace,
}

/// Reconciles the cache with the manifest and downloads what is missing
pub struct ContentSynchronizer {
    context: Arc<PlaybackContext>,
    cache: Arc<CacheManager>,
    transport: Arc<dyn Transport>,
    swapper: Arc<FileSwapper>,
    config: SyncConfig,
    events: EventSink,
    manifest: RwLock<Arc<PlaybackConfig>>,
    queue: Mutex<Vec<ContentItem>>,
    pass_lock: tokio::sync::Mutex<()>,
}

impl ContentSynchronizer {
    pub fn new(
        context: Arc<PlaybackContext>,
        cache: Arc<CacheManager>,
        transport: Arc<dyn Transport>,
        swapper: Arc<FileSwapper>,
        config: SyncConfig,
    ) -> Self {
        Self {
            context,
            cache,
            transport,
            swapper,
            config,
            events: EventSink::disabled(),
            manifest: RwLock::new(Arc::new(PlaybackConfig::default())),
            queue: Mutex::new(Vec::new()),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Report progress and lifecycle events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Replace the active manifest
    ///
    /// A pass already running keeps working its old queue; the next
    /// [`check_download`](Self::check_download) reconciles against the new
    /// manifest.
    pub fn update_manifest(&self, manifest: Arc<PlaybackConfig>) {
        self.context.set_priority_ids(manifest.priority_ids());
        info!(
            "Synchronizer now tracking {} items in {} campaigns",
            manifest.item_count(),
            manifest.campaigns.len()
        );
        *self.manifest.write() = manifest;
    }

    pub fn manifest(&self) -> Arc<PlaybackConfig> {
        self.manifest.read().clone()
    }

    /// Ids currently queued for download, in order
    pub fn queued_ids(&self) -> Vec<String> {
        self.queue.lock().iter().map(|item| item.id.clone()).collect()
    }

    /// Compare the manifest with the cache and rebuild the download queue
    ///
    /// Items with a verified file are activated, the others deactivated and
    /// queued. Online items need no file and are always activated. Calling
    /// this twice without a filesystem change in between yields the same
    /// queue and counts.
    pub async fn check_download(&self) -> DownloadCheck {
        let manifest = self.manifest();
        let layout = self.cache.layout();
        let verifier = self.cache.verifier();

        let mut seen = HashSet::new();
        let mut live_paths = HashSet::new();
        let mut pending = Vec::new();
        let mut ready = 0;

        for item in manifest.items() {
            if !seen.insert(item.id.as_str()) {
                continue;
            }

            if !item.is_downloadable() {
                self.context.set_activated(&item.id, true);
                ready += 1;
                continue;
            }

            let (Some(file), Some(paths)) = (item.file.as_ref(), layout.item_paths(item)) else {
                warn!("Content {} has no file reference, skipping", item.id);
                self.context.set_activated(&item.id, false);
                continue;
            };

            live_paths.insert(paths.main.clone());
            live_paths.insert(paths.temp.clone());

            let cached = match verifier.check(&paths.main, &file.hash).await {
                Ok(FileCheck::Verified) => self.ensure_bundle_extracted(item, &paths).await,
                Ok(FileCheck::Missing) => false,
                Ok(FileCheck::Mismatch { actual, .. }) => {
                    debug!("Cached file for {} has hash {}, expected {}", item.id, actual, file.hash);
                    false
                }
                Err(e) => {
                    warn!("Could not verify cached file for {}: {}", item.id, e);
                    false
                }
            };

            if cached {
                self.context.set_activated(&item.id, true);
                ready += 1;
            } else {
                self.context.set_activated(&item.id, false);
                pending.push(item.clone());
            }
        }

        // Digests of files the manifest no longer names are never asked for again
        verifier.retain(|path| live_paths.contains(path));

        let queue = order_download_queue(pending, &self.context);
        let check = DownloadCheck {
            pending: queue.len(),
            ready,
        };
        *self.queue.lock() = queue;

        info!(
            "Cache check: {} items to download, {} ready",
            check.pending, check.ready
        );
        self.events
            .send(SyncEvent::CheckCompleted {
                pending: check.pending,
                ready: check.ready,
            })
            .await;
        check
    }

    /// Download every queued item, one at a time
    ///
    /// Returns once every item has either been activated or given up for
    /// this pass. Activation of swapped files waits for the swapper, so an
    /// item that is playing when its download finishes holds the pass open
    /// until it stops.
    pub async fn run_pass(&self) -> SyncReport {
        let _pass = self.pass_lock.lock().await;
        let queue = self.queue.lock().clone();
        let total = queue.len();
        let mut report = SyncReport::default();
        let mut activations = JoinSet::new();

        if total > 0 {
            info!("Starting download pass over {} items", total);
        }

        for (index, item) in queue.iter().enumerate() {
            let size = item.file.as_ref().map(|f| f.size).unwrap_or(0);
            self.events
                .send(SyncEvent::ItemStarted {
                    content_id: item.id.clone(),
                    index,
                    total,
                    size,
                })
                .await;

            match self.download_item(item, index, total, &mut report).await {
                Ok(finished) => {
                    let ticket = match finished {
                        Finished::Swap(ticket) => Some(ticket),
                        Finished::InPlace => None,
                    };
                    activations.spawn(activate_after_grace(
                        item.id.clone(),
                        ticket,
                        self.config.activation_grace,
                        self.context.clone(),
                        self.events.clone(),
                    ));
                }
                Err(e) => {
                    error!("Giving up on {} for this pass: {}", item.id, e);
                    report.failed.push((item.id.clone(), e.to_string()));
                    self.events
                        .send(SyncEvent::ItemFailed {
                            content_id: item.id.clone(),
                            reason: e.to_string(),
                        })
                        .await;
                }
            }

            self.events.try_send(SyncEvent::TotalProgress {
                fraction: (index + 1) as f64 / total as f64,
            });
        }

        while let Some(joined) = activations.join_next().await {
            match joined {
                Ok(Ok(content_id)) => report.completed.push(content_id),
                Ok(Err((content_id, reason))) => report.failed.push((content_id, reason)),
                Err(e) => warn!("Activation task failed: {}", e),
            }
        }

        if total > 0 {
            info!(
                "Download pass finished: {} completed, {} failed",
                report.completed.len(),
                report.failed.len()
            );
        }
        self.events
            .send(SyncEvent::PassCompleted {
                completed: report.completed.len(),
                failed: report.failed.len(),
            })
            .await;
        report
    }

    /// Transfer one item, retrying transport failures without limit
    async fn download_item(
        &self,
        item: &ContentItem,
        index: usize,
        total: usize,
        report: &mut SyncReport,
    ) -> DownloadResult<Finished> {
        let missing = || DownloadError::MissingFileReference {
            content_id: item.id.clone(),
        };
        let file = item.file.as_ref().ok_or_else(missing)?;
        let paths = self.cache.layout().item_paths(item).ok_or_else(missing)?;
        let mut integrity_failures = 0;

        loop {
            let request = transfer::TransferRequest {
                content_id: &item.id,
                file,
                temp: &paths.temp,
                read_timeout: self.config.read_timeout,
            };
            let events = &self.events;
            let on_progress = |received: u64| {
                events.try_send(SyncEvent::ItemProgress {
                    content_id: item.id.clone(),
                    received,
                    total: file.size,
                });
                let item_fraction = if file.size == 0 {
                    1.0
                } else {
                    received as f64 / file.size as f64
                };
                events.try_send(SyncEvent::TotalProgress {
                    fraction: (index as f64 + item_fraction) / total as f64,
                });
            };

            match transfer::run_transfer(
                request,
                self.transport.as_ref(),
                self.cache.verifier(),
                on_progress,
            )
            .await
            {
                Ok(outcome) => {
                    report.bytes_downloaded += outcome.bytes_received;
                    if outcome.resumed_from > 0 {
                        report.resumed += 1;
                    }
                    break;
                }
                Err(e) if e.is_transient() => {
                    report.retries += 1;
                    warn!(
                        "Transfer of {} failed: {}; retrying in {:?}",
                        item.id, e, self.config.reconnect_backoff
                    );
                    tokio::time::sleep(self.config.reconnect_backoff).await;
                }
                Err(e) if e.is_integrity_failure() => {
                    transfer::discard_temp_file(&paths.temp).await?;
                    integrity_failures += 1;
                    if integrity_failures > self.config.integrity_retries {
                        return Err(e);
                    }
                    warn!(
                        "Download of {} failed verification: {}; restarting in {:?}",
                        item.id, e, self.config.reconnect_backoff
                    );
                    tokio::time::sleep(self.config.reconnect_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        self.finish(item, &paths).await
    }

    /// Hand a verified temp file over to its final location
    async fn finish(&self, item: &ContentItem, paths: &ItemPaths) -> DownloadResult<Finished> {
        if item.media_type.is_bundle() {
            let destination = self.cache.layout().bundle_dir(&item.id);
            let entries = extract_bundle(&paths.temp, &destination).await?;
            debug!("Unpacked {} entries for {}", entries, item.id);
            replace_file(&paths.temp, &paths.main).await?;
            self.cache.verifier().invalidate(&paths.main);
            self.cache.verifier().invalidate(&paths.temp);
            return Ok(Finished::InPlace);
        }

        // The temp file is renamed away by the swapper
        self.cache.verifier().invalidate(&paths.main);
        self.cache.verifier().invalidate(&paths.temp);
        let ticket = self.swapper.enqueue(SwapJob {
            content_id: item.id.clone(),
            main: paths.main.clone(),
            temp: paths.temp.clone(),
        });
        Ok(Finished::Swap(ticket))
    }

    /// Re-extract a cached bundle whose directory has gone missing
    async fn ensure_bundle_extracted(&self, item: &ContentItem, paths: &ItemPaths) -> bool {
        if !item.media_type.is_bundle() {
            return true;
        }
        let destination = self.cache.layout().bundle_dir(&item.id);
        if destination.is_dir() {
            return true;
        }
        match extract_bundle(&paths.main, &destination).await {
            Ok(entries) => {
                info!("Restored bundle directory for {} ({} entries)", item.id, entries);
                true
            }
            Err(e) => {
                warn!("Could not unpack bundle for {}: {}", item.id, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for ContentSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSynchronizer")
            .field("config", &self.config)
            .field("queued", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

async fn replace_file(temp: &Path, main: &Path) -> DownloadResult<()> {
    match tokio::fs::remove_file(main).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CacheError::io("remove", main, e).into()),
    }
    tokio::fs::rename(temp, main)
        .await
        .map_err(|e| CacheError::io("rename", temp, e).into())
}

/// Wait out the grace period and the swap, then mark the item playable
async fn activate_after_grace(
    content_id: String,
    ticket: Option<SwapTicket>,
    grace: std::time::Duration,
    context: Arc<PlaybackContext>,
    events: EventSink,
) -> Result<String, (String, String)> {
    tokio::time::sleep(grace).await;

    if let Some(ticket) = ticket {
        if let Err(e) = ticket.wait().await {
            warn!("File for {} was not put in place: {}", content_id, e);
            events
                .send(SyncEvent::ItemFailed {
                    content_id: content_id.clone(),
                    reason: e.to_string(),
                })
                .await;
            return Err((content_id, e.to_string()));
        }
    }

    context.set_activated(&content_id, true);
    info!("{} is ready to play", content_id);
    events
        .send(SyncEvent::ItemReady {
            content_id: content_id.clone(),
        })
        .await;
    Ok(content_id)
}
