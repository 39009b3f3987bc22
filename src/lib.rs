//! Signage Fetcher Library
//!
//! Content synchronization and playlist selection for digital signage
//! players. A manifest describes campaigns of display areas; the library
//! keeps a local cache of the media those areas play using resumable,
//! hash-verified downloads, swaps updated files in without disturbing the
//! item on screen, and picks the next item per area from the cached content.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
