//! Playback manifest model
//!
//! This module turns the server's playback configuration into typed
//! campaigns, areas and content items, and evaluates the eligibility rules
//! attached to them.
//!
//! # Key Features
//!
//! - **Lenient parsing**: invalid campaigns or items are skipped and reported,
//!   never aborting the whole manifest
//! - **Closed enums**: play type and media type tags are resolved once
//! - **Targeting predicates**: date windows, weekday/hour allow lists and
//!   geofences with even-odd polygon tests on fixed-point coordinates
//! - **Campaign rotation**: date-aware cursor with a minimum slot length
//!
//! # Module Organization
//!
//! - [`types`] - Manifest tree (PlaybackConfig, Campaign, Area, ContentItem)
//! - [`targeting`] - DateRange, TimeTargeting, GeoFence predicates
//! - [`parse`] - JSON wire format and validation
//! - [`rotation`] - Campaign rotation
//! - [`source`] - Loading from files or HTTP
//!
//! # Examples
//!
//! ```rust,no_run
//! use signage_fetcher::app::manifest::parse_manifest;
//!
//! # fn example(json: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let parsed = parse_manifest(json)?;
//! for item in parsed.config.items() {
//!     println!("{} ({:?})", item.id, item.play_type);
//! }
//! for rejected in &parsed.rejected {
//!     eprintln!("skipped: {}", rejected);
//! }
//! # Ok(())
//! # }
//! ```

pub mod parse;
pub mod rotation;
pub mod source;
pub mod targeting;
pub mod types;

pub use parse::{parse_manifest, parse_manifest_file, ManifestStats, ParsedManifest};
pub use rotation::CampaignRotation;
pub use source::ManifestSource;
pub use targeting::{DateRange, GeoFence, GeoPoint, Polygon, TimeTargeting};
pub use types::{
    Area, AreaGeometry, Campaign, ContentItem, FileRef, MediaType, PlayType, PlaybackConfig,
};
