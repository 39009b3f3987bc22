//! Core manifest types
//!
//! The manifest is a tree: a [`PlaybackConfig`] holds campaigns, each campaign
//! holds display areas, and each area holds an ordered list of
//! [`ContentItem`]s. String tags from the wire format (play type, media type)
//! are resolved into closed enums once, at parse time.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::app::hash::Md5Hash;
use crate::app::manifest::targeting::{DateRange, GeoFence, TimeTargeting};

/// Pool membership of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayType {
    /// Primary rotation, subject to the recency delay
    Fixed,
    /// Secondary rotation, no recency delay
    None,
    /// Filler, honours only time and geo targeting
    Free,
    /// Missing or unrecognised tag
    Unlabeled,
}

impl PlayType {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("fixed") => PlayType::Fixed,
            Some("none") => PlayType::None,
            Some("free") => PlayType::Free,
            _ => PlayType::Unlabeled,
        }
    }
}

/// Kind of asset an item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
    Image,
    /// Zip archive unpacked into a directory before playback
    HtmlBundle,
    /// Remote page rendered live; never downloaded
    HtmlOnline,
}

impl MediaType {
    /// Resolve a manifest `type` tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "video" => Some(MediaType::Video),
            "audio" => Some(MediaType::Audio),
            "image" => Some(MediaType::Image),
            "html5_zip" => Some(MediaType::HtmlBundle),
            "html5_online" => Some(MediaType::HtmlOnline),
            _ => None,
        }
    }

    /// Whether the item needs a local file
    pub fn is_downloadable(&self) -> bool {
        !matches!(self, MediaType::HtmlOnline)
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, MediaType::HtmlBundle)
    }
}

/// Remote file backing a content item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub url: Url,
    pub hash: Md5Hash,
    /// Expected size in bytes
    pub size: u64,
    /// Extension including the leading dot, may be empty
    pub extension: String,
}

impl FileRef {
    pub fn new(url: Url, hash: Md5Hash, size: u64, extension: impl Into<String>) -> Self {
        Self {
            url,
            hash,
            size,
            extension: extension.into(),
        }
    }
}

/// A single playable asset with its targeting metadata
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: String,
    pub campaign_id: String,
    pub area_id: String,
    pub name: String,
    pub media_type: MediaType,
    pub play_type: PlayType,
    /// Ineligibility period after the item has been selected
    pub delay: Duration,
    /// Nominal play length reported by the server
    pub duration: Duration,
    pub play_order: i64,
    /// Present for every downloadable media type
    pub file: Option<FileRef>,
    /// Page address for [`MediaType::HtmlOnline`] items
    pub online_url: Option<String>,
    pub date_range: DateRange,
    pub time_targeting: TimeTargeting,
    pub geo_fence: GeoFence,
}

impl ContentItem {
    /// Create an item with no file and no targeting
    pub fn new(id: impl Into<String>, media_type: MediaType, play_type: PlayType) -> Self {
        Self {
            id: id.into(),
            campaign_id: String::new(),
            area_id: String::new(),
            name: String::new(),
            media_type,
            play_type,
            delay: Duration::ZERO,
            duration: Duration::ZERO,
            play_order: 0,
            file: None,
            online_url: None,
            date_range: DateRange::unbounded(),
            time_targeting: TimeTargeting::default(),
            geo_fence: GeoFence::default(),
        }
    }

    /// Set the recency delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Attach the remote file
    pub fn with_file(mut self, file: FileRef) -> Self {
        self.file = Some(file);
        self
    }

    /// Set the owning campaign and area
    pub fn with_placement(mut self, campaign_id: &str, area_id: &str) -> Self {
        self.campaign_id = campaign_id.to_string();
        self.area_id = area_id.to_string();
        self
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn with_time_targeting(mut self, time_targeting: TimeTargeting) -> Self {
        self.time_targeting = time_targeting;
        self
    }

    pub fn with_geo_fence(mut self, geo_fence: GeoFence) -> Self {
        self.geo_fence = geo_fence;
        self
    }

    pub fn is_downloadable(&self) -> bool {
        self.media_type.is_downloadable() && self.file.is_some()
    }
}

/// Position and layering of a display area within its campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AreaGeometry {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    /// 0.0 (transparent) to 1.0 (opaque)
    pub opacity: f64,
    pub z_index: i64,
}

/// Independently scheduled display region
#[derive(Debug, Clone)]
pub struct Area {
    pub id: String,
    pub kind: String,
    pub geometry: AreaGeometry,
    pub sound_enabled: bool,
    pub content: Vec<ContentItem>,
    pub priority_content: Vec<String>,
}

/// Date-bounded rotation of areas shown together
#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: String,
    /// How long the campaign occupies the screen per rotation
    pub duration: Duration,
    pub window: DateRange,
    pub play_order: i64,
    pub width: i64,
    pub height: i64,
    /// Spacing between consecutive items, in milliseconds
    pub content_spacing: i64,
    pub portrait: bool,
    pub areas: Vec<Area>,
}

impl Campaign {
    pub fn item_count(&self) -> usize {
        self.areas.iter().map(|a| a.content.len()).sum()
    }

    pub fn area(&self, area_id: &str) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == area_id)
    }
}

/// The full playback configuration delivered by the server
#[derive(Debug, Clone, Default)]
pub struct PlaybackConfig {
    pub last_modified: Option<String>,
    pub hash: Option<String>,
    pub campaigns: Vec<Campaign>,
}

impl PlaybackConfig {
    /// Every content item, flattened campaign → area → content in order
    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.campaigns
            .iter()
            .flat_map(|c| c.areas.iter())
            .flat_map(|a| a.content.iter())
    }

    pub fn item_count(&self) -> usize {
        self.campaigns.iter().map(Campaign::item_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// All ids listed as priority content by any area
    pub fn priority_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for area in self.campaigns.iter().flat_map(|c| c.areas.iter()) {
            for id in &area.priority_content {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// First item with this id anywhere in the manifest
    pub fn find_item(&self, content_id: &str) -> Option<&ContentItem> {
        self.items().find(|item| item.id == content_id)
    }

    pub fn campaign(&self, campaign_id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == campaign_id)
    }
}
