//! Synchronizer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{http, sync};

/// Timing knobs for the content synchronizer
///
/// None of these adapt at runtime: a failed transfer is retried after the
/// same back-off every time, without a ceiling on the number of attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Wait before retrying an item after a transport failure
    pub reconnect_backoff: Duration,
    /// Delay between handing a file to the swapper and activating it
    pub activation_grace: Duration,
    /// Longest gap between two body chunks
    pub read_timeout: Duration,
    /// Verification failures of fresh downloads tolerated per item and pass
    pub integrity_retries: u32,
    /// Buffer size of the event channel
    pub event_buffer_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: sync::RECONNECT_BACKOFF,
            activation_grace: sync::ACTIVATION_GRACE,
            read_timeout: http::READ_TIMEOUT,
            integrity_retries: sync::INTEGRITY_RETRIES,
            event_buffer_size: sync::EVENT_BUFFER_SIZE,
        }
    }
}

impl SyncConfig {
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn with_activation_grace(mut self, grace: Duration) -> Self {
        self.activation_grace = grace;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_integrity_retries(mut self, retries: u32) -> Self {
        self.integrity_retries = retries;
        self
    }
}
