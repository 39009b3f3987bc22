//! Application constants for Signage Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Signage-Fetcher/0.1.0 (Playback Device)";

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum time without receiving a body chunk before the transfer is
    /// considered lost
    pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;
}

/// Content synchronization timing
///
/// All of these are fixed; none of them adapt to failure history.
pub mod sync {
    use super::Duration;

    /// Wait before retrying a transfer after a transport failure
    pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

    /// Delay between handing a finished file to the swapper and marking it playable
    pub const ACTIVATION_GRACE: Duration = Duration::from_secs(5);

    /// Channel buffer size for synchronizer events
    pub const EVENT_BUFFER_SIZE: usize = 256;

    /// Fresh downloads of one item that may fail verification before the
    /// item is given up for the current pass
    pub const INTEGRITY_RETRIES: u32 = 2;
}

/// File swapper timing
pub mod swap {
    use super::Duration;

    /// Period of the swap check while work is queued
    pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
}

/// File operation constants
pub mod files {
    /// Marker appended to the canonical file name while a download is in progress
    pub const TEMP_FILE_SUFFIX: &str = "_";

    /// Read buffer size for streaming hash computation (64KB)
    pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

    /// Directory name used under the user cache dir when none is configured
    pub const DEFAULT_CACHE_DIR_NAME: &str = "signage-fetcher";
}

/// Manifest and targeting constants
pub mod manifest {
    use super::Duration;

    /// Timestamp format used by the manifest for validity windows
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Fixed-point scale applied to latitude/longitude before polygon tests
    pub const GEO_SCALE: f64 = 100_000.0;

    /// Shortest slot a campaign is allowed to occupy in the rotation
    pub const MIN_CAMPAIGN_SLOT: Duration = Duration::from_secs(10);
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";

    /// Log every Nth progress chunk at debug level during a transfer
    pub const PROGRESS_LOG_EVERY: u64 = 10;
}

// Re-export commonly used constants for convenience
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use swap::TICK_INTERVAL as SWAP_TICK_INTERVAL;
pub use sync::{ACTIVATION_GRACE, RECONNECT_BACKOFF};
