//! Synchronizer notifications
//!
//! Events are for display only; nothing in the synchronizer reads them back.
//! Progress events are sent with `try_send` and silently dropped when the
//! receiver falls behind. Lifecycle events are awaited so that an observer
//! sees every `ItemReady` exactly once.

use tokio::sync::mpsc;
use tracing::debug;

/// Progress and lifecycle notifications from the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Reconciliation finished
    CheckCompleted { pending: usize, ready: usize },
    /// A transfer is about to start
    ItemStarted {
        content_id: String,
        index: usize,
        total: usize,
        size: u64,
    },
    /// Bytes of the current item on disk
    ItemProgress {
        content_id: String,
        received: u64,
        total: u64,
    },
    /// Fraction of the current pass, between 0 and 1
    TotalProgress { fraction: f64 },
    /// The item has been activated and is playable
    ItemReady { content_id: String },
    /// The item was given up for this pass
    ItemFailed { content_id: String, reason: String },
    /// All queued items have been handled
    PassCompleted { completed: usize, failed: usize },
}

/// Optional sender end of the event channel
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::Sender<SyncEvent>>,
}

impl EventSink {
    /// Create a sink and its receiver
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self::new(sender), receiver)
    }

    pub fn new(sender: mpsc::Sender<SyncEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Deliver an event, waiting for buffer space
    pub async fn send(&self, event: SyncEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).await.is_err() {
                debug!("Sync event receiver closed");
            }
        }
    }

    /// Deliver an event if there is room right now
    pub fn try_send(&self, event: SyncEvent) {
        if let Some(sender) = &self.sender {
            match sender.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Receiver is behind, skip this update
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Sync event receiver closed");
                }
            }
        }
    }
}
