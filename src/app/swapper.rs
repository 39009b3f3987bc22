//! Deferred replacement of cached files
//!
//! A freshly downloaded file sits next to the old one under its temporary
//! name until the swapper moves it into place. The move never happens while
//! the front end reports the item as currently playing: such jobs stay queued
//! and are retried on the next tick. Once the item stops playing the old file
//! is removed and the temporary file renamed over it, which is atomic on a
//! single filesystem.
//!
//! The swapper ticks on a fixed period while it has work and parks on a
//! [`Notify`] when its queue is empty.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot, Notify};
use tracing::{debug, info, warn};

use crate::app::state::PlaybackContext;
use crate::constants::SWAP_TICK_INTERVAL;
use crate::errors::{SwapError, SwapResult};

/// Configuration for the swap loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Delay between checks while jobs are pending
    pub tick_interval: Duration,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            tick_interval: SWAP_TICK_INTERVAL,
        }
    }
}

/// A finished download waiting to replace its main file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapJob {
    pub content_id: String,
    pub main: PathBuf,
    pub temp: PathBuf,
}

/// Completion handle for an enqueued job
#[derive(Debug)]
pub struct SwapTicket {
    content_id: String,
    receiver: oneshot::Receiver<SwapResult<()>>,
}

impl SwapTicket {
    /// Wait until the job has been carried out
    pub async fn wait(self) -> SwapResult<()> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(SwapError::Abandoned {
                content_id: self.content_id,
            }),
        }
    }
}

struct PendingSwap {
    job: SwapJob,
    waiters: Vec<oneshot::Sender<SwapResult<()>>>,
}

impl PendingSwap {
    fn resolve(self, result: SwapResult<()>) {
        let failed = result.is_err();
        let mut waiters = self.waiters.into_iter();
        // Only the first waiter receives the underlying error
        if let Some(first) = waiters.next() {
            let _ = first.send(result);
        }
        for waiter in waiters {
            let outcome = if failed {
                Err(SwapError::Abandoned {
                    content_id: self.job.content_id.clone(),
                })
            } else {
                Ok(())
            };
            let _ = waiter.send(outcome);
        }
    }
}

/// Queue of pending file replacements
pub struct FileSwapper {
    context: Arc<PlaybackContext>,
    config: SwapConfig,
    queue: Mutex<Vec<PendingSwap>>,
    wakeup: Notify,
}

impl FileSwapper {
    pub fn new(context: Arc<PlaybackContext>, config: SwapConfig) -> Self {
        Self {
            context,
            config,
            queue: Mutex::new(Vec::new()),
            wakeup: Notify::new(),
        }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    /// Queue a replacement; the ticket resolves once it has been carried out
    ///
    /// A second job for the same main file joins the first one instead of
    /// queueing another rename.
    pub fn enqueue(&self, job: SwapJob) -> SwapTicket {
        let (sender, receiver) = oneshot::channel();
        let content_id = job.content_id.clone();

        {
            let mut queue = self.queue.lock();
            match queue.iter_mut().find(|pending| pending.job.main == job.main) {
                Some(existing) => existing.waiters.push(sender),
                None => {
                    debug!("Queued swap for {} ({})", job.content_id, job.main.display());
                    queue.push(PendingSwap {
                        job,
                        waiters: vec![sender],
                    });
                }
            }
        }

        self.wakeup.notify_one();
        SwapTicket {
            content_id,
            receiver,
        }
    }

    /// Number of queued jobs
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run one pass over the queue, returning how many jobs completed
    ///
    /// Jobs whose item is currently playing stay queued. Failed jobs are
    /// dropped and their tickets resolve with the error.
    pub async fn tick(&self) -> usize {
        let jobs: Vec<PendingSwap> = std::mem::take(&mut *self.queue.lock());
        let mut deferred = Vec::new();
        let mut completed = 0;

        for pending in jobs {
            if self.context.is_playing(&pending.job.content_id) {
                debug!("Deferring swap for {}: currently playing", pending.job.content_id);
                deferred.push(pending);
                continue;
            }

            let result = Self::replace(&pending.job).await;
            match &result {
                Ok(()) => {
                    info!("Swapped in new file for {}", pending.job.content_id);
                    completed += 1;
                }
                Err(e) => warn!("Swap for {} failed: {}", pending.job.content_id, e),
            }
            pending.resolve(result);
        }

        if !deferred.is_empty() {
            let mut queue = self.queue.lock();
            // Deferred jobs keep their place ahead of anything queued meanwhile
            deferred.append(&mut queue);
            *queue = deferred;
        }

        completed
    }

    /// Tick until shutdown, sleeping while the queue is empty
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        debug!("File swapper started");
        loop {
            if self.pending() == 0 {
                tokio::select! {
                    _ = self.wakeup.notified() => {}
                    _ = shutdown.recv() => break,
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {
                    self.tick().await;
                }
                _ = shutdown.recv() => break,
            }
        }
        debug!("File swapper stopped with {} jobs pending", self.pending());
    }

    async fn replace(job: &SwapJob) -> SwapResult<()> {
        match tokio::fs::remove_file(&job.main).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SwapError::Remove {
                    path: job.main.clone(),
                    source,
                })
            }
        }

        tokio::fs::rename(&job.temp, &job.main)
            .await
            .map_err(|source| SwapError::Rename {
                temp_path: job.temp.clone(),
                final_path: job.main.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for FileSwapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSwapper")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(dir: &TempDir, id: &str) -> SwapJob {
        let main = dir.path().join(format!("{}.mp4", id));
        SwapJob {
            content_id: id.to_string(),
            temp: PathBuf::from(format!("{}_", main.display())),
            main,
        }
    }

    async fn write(path: &std::path::Path, content: &str) {
        tokio::fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn test_swap_replaces_main_file() {
        let temp_dir = TempDir::new().unwrap();
        let context = Arc::new(PlaybackContext::with_system_clock());
        let swapper = FileSwapper::new(context, SwapConfig::default());

        let job = job(&temp_dir, "a");
        write(&job.main, "old").await;
        write(&job.temp, "new").await;

        let ticket = swapper.enqueue(job.clone());
        assert_eq!(swapper.tick().await, 1);
        ticket.wait().await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&job.main).await.unwrap(), "new");
        assert!(!job.temp.exists());
        assert_eq!(swapper.pending(), 0);
    }

    #[tokio::test]
    async fn test_playing_item_is_deferred() {
        let temp_dir = TempDir::new().unwrap();
        let context = Arc::new(PlaybackContext::with_system_clock());
        let swapper = FileSwapper::new(context.clone(), SwapConfig::default());

        let job = job(&temp_dir, "a");
        write(&job.main, "old").await;
        write(&job.temp, "new").await;

        context.set_currently_playing(Some("a"));
        swapper.enqueue(job.clone());

        assert_eq!(swapper.tick().await, 0);
        assert_eq!(swapper.tick().await, 0);
        assert_eq!(tokio::fs::read_to_string(&job.main).await.unwrap(), "old");
        assert_eq!(swapper.pending(), 1);

        context.set_currently_playing(Some("b"));
        assert_eq!(swapper.tick().await, 1);
        assert_eq!(tokio::fs::read_to_string(&job.main).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_missing_main_file_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let swapper = FileSwapper::new(
            Arc::new(PlaybackContext::with_system_clock()),
            SwapConfig::default(),
        );

        let job = job(&temp_dir, "fresh");
        write(&job.temp, "data").await;

        let ticket = swapper.enqueue(job.clone());
        swapper.tick().await;
        assert!(ticket.wait().await.is_ok());
        assert!(job.main.exists());
    }

    #[tokio::test]
    async fn test_missing_temp_file_fails_the_ticket() {
        let temp_dir = TempDir::new().unwrap();
        let swapper = FileSwapper::new(
            Arc::new(PlaybackContext::with_system_clock()),
            SwapConfig::default(),
        );

        let ticket = swapper.enqueue(job(&temp_dir, "ghost"));
        assert_eq!(swapper.tick().await, 0);
        assert!(matches!(
            ticket.wait().await,
            Err(SwapError::Rename { .. })
        ));
        assert_eq!(swapper.pending(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_jobs_share_one_rename() {
        let temp_dir = TempDir::new().unwrap();
        let swapper = FileSwapper::new(
            Arc::new(PlaybackContext::with_system_clock()),
            SwapConfig::default(),
        );

        let job = job(&temp_dir, "a");
        write(&job.temp, "new").await;

        let first = swapper.enqueue(job.clone());
        let second = swapper.enqueue(job.clone());
        assert_eq!(swapper.pending(), 1);

        swapper.tick().await;
        assert!(first.wait().await.is_ok());
        assert!(second.wait().await.is_ok());
        assert_eq!(tokio::fs::read_to_string(&job.main).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_dropped_swapper_abandons_ticket() {
        let temp_dir = TempDir::new().unwrap();
        let swapper = FileSwapper::new(
            Arc::new(PlaybackContext::with_system_clock()),
            SwapConfig::default(),
        );

        let ticket = swapper.enqueue(job(&temp_dir, "a"));
        drop(swapper);

        assert!(matches!(
            ticket.wait().await,
            Err(SwapError::Abandoned { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_keeps_deferring_while_playing() {
        let temp_dir = TempDir::new().unwrap();
        let context = Arc::new(PlaybackContext::with_system_clock());
        let swapper = Arc::new(FileSwapper::new(context.clone(), SwapConfig::default()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(swapper.clone().run(shutdown_rx));

        context.set_currently_playing(Some("a"));
        let mut ticket = swapper.enqueue(job(&temp_dir, "a"));

        // A minute of virtual ticks never touches the playing item
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(swapper.pending(), 1);
        assert!(ticket.receiver.try_recv().is_err());

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(swapper.pending(), 1);
    }
}
