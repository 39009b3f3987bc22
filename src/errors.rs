//! Error types for Signage Fetcher
//!
//! This module defines the error types for all components of the application.
//! Every fallible operation returns one of these so callers can decide between
//! retrying the same item, discarding partial data, skipping a manifest entry,
//! or deferring the item to the next reconciliation pass.

use std::path::PathBuf;
use thiserror::Error;

/// Manifest parsing and validation errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("Manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// JSON parsing error
    #[error("JSON parsing error in manifest")]
    JsonParse(#[from] serde_json::Error),

    /// I/O error reading manifest
    #[error("I/O error reading manifest")]
    Io(#[from] std::io::Error),

    /// Manifest could not be fetched from the server
    #[error("Failed to fetch manifest from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Invalid hash format
    #[error("Invalid hash format: {hash}. Expected MD5 hex string")]
    InvalidHash { hash: String },

    /// A campaign entry that cannot be used
    #[error("Invalid campaign {campaign_id}: {reason}")]
    InvalidCampaign { campaign_id: String, reason: String },

    /// A content entry that cannot be used
    #[error("Invalid content {content_id}: {reason}")]
    InvalidContent { content_id: String, reason: String },

    /// Media type string not recognised
    #[error("Unknown media type '{media_type}' for content {content_id}")]
    UnknownMediaType {
        content_id: String,
        media_type: String,
    },

    /// Invalid file URL in manifest
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Download and HTTP transport errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Server refused the requested byte range
    #[error("Server rejected byte range starting at {offset}")]
    RangeNotSatisfiable { offset: u64 },

    /// Ranged reply started somewhere other than the requested byte
    #[error("Server resumed at byte {served} instead of {requested}")]
    MisalignedRange { requested: u64, served: u64 },

    /// Body stream broke off mid-transfer
    #[error("Transfer interrupted: {reason}")]
    Stream { reason: String },

    /// No body chunk arrived within the read timeout
    #[error("Transfer stalled for {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Invalid file hash - download corrupted
    #[error("File hash mismatch. Expected: {expected}, got: {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Temp file grew past the size announced by the manifest
    #[error("Temp file has {size} bytes but only {expected} were expected")]
    OversizedTempFile { size: u64, expected: u64 },

    /// Incomplete download
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// Content has no downloadable file reference
    #[error("Content {content_id} has no file to download")]
    MissingFileReference { content_id: String },

    /// Cache-side failure while handling a transfer
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Invalid component wiring
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl DownloadError {
    /// Transport failures that keep partial data and retry the same item
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DownloadError::Http(_)
                | DownloadError::ServerError { .. }
                | DownloadError::Stream { .. }
                | DownloadError::Timeout { .. }
                | DownloadError::IncompleteDownload { .. }
        )
    }

    /// Failures that invalidate the bytes already on disk
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            DownloadError::HashMismatch { .. }
                | DownloadError::OversizedTempFile { .. }
                | DownloadError::RangeNotSatisfiable { .. }
                | DownloadError::MisalignedRange { .. }
        )
    }
}

/// Cache storage errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// A filesystem primitive failed on a cache path
    #[error("Filesystem operation '{operation}' failed on {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Hash could not be computed
    #[error("Failed to hash {path}: {reason}")]
    HashComputation { path: PathBuf, reason: String },

    /// Bundle archive could not be unpacked
    #[error("Failed to extract bundle {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },
}

impl CacheError {
    /// Wrap an I/O error with the operation and path it happened on
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// File swap errors
#[derive(Error, Debug)]
pub enum SwapError {
    /// The stale main file could not be removed
    #[error("Failed to remove {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    Rename {
        temp_path: PathBuf,
        final_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The swapper went away before the job was processed
    #[error("Swap for {content_id} was abandoned")]
    Abandoned { content_id: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Swap error
    #[error(transparent)]
    Swap(#[from] SwapError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Download(e) => e.is_transient() || e.is_integrity_failure(),
            AppError::Manifest(ManifestError::Fetch { .. }) => true,
            AppError::Cache(_) | AppError::Swap(_) => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Manifest(_) => "manifest",
            AppError::Download(_) => "download",
            AppError::Cache(_) => "cache",
            AppError::Swap(_) => "swap",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Swap result type alias
pub type SwapResult<T> = std::result::Result<T, SwapError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
