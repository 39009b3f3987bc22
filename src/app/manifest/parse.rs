//! Lenient manifest parsing
//!
//! The server document is deserialized into loosely typed wire structs first,
//! then each campaign, area and content entry is validated on its own. An
//! entry that fails validation is logged, recorded in [`ManifestStats`] and
//! skipped; the rest of the manifest is still used. Only a document that is
//! not JSON at all is rejected outright.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::hash::Md5Hash;
use crate::app::manifest::targeting::{DateRange, GeoFence, GeoPoint, Polygon, TimeTargeting};
use crate::app::manifest::types::{
    Area, AreaGeometry, Campaign, ContentItem, FileRef, MediaType, PlayType, PlaybackConfig,
};
use crate::errors::{ManifestError, ManifestResult};

/// Counters collected while parsing a manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestStats {
    pub campaigns_parsed: usize,
    pub campaigns_skipped: usize,
    pub areas_parsed: usize,
    pub areas_skipped: usize,
    pub items_parsed: usize,
    pub items_skipped: usize,
}

impl ManifestStats {
    pub fn total_skipped(&self) -> usize {
        self.campaigns_skipped + self.areas_skipped + self.items_skipped
    }
}

/// Result of parsing: the usable configuration plus every rejected entry
#[derive(Debug)]
pub struct ParsedManifest {
    pub config: PlaybackConfig,
    pub stats: ManifestStats,
    pub rejected: Vec<ManifestError>,
}

#[derive(Debug, Deserialize)]
struct WireManifest {
    #[serde(default, deserialize_with = "lenient_string")]
    last_modified: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    hash: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    campaigns: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireCampaign {
    #[serde(default, deserialize_with = "lenient_string")]
    campaign_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    duration: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    start_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    end_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    play_order: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    width: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    height: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    content_spacing: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    orientation: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    areas: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireArea {
    #[serde(default, deserialize_with = "lenient_string")]
    area_id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    x: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    y: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    width: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    height: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    opacity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    z_index: Option<i64>,
    #[serde(default)]
    sound_enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient_list")]
    content: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    priority_content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default, deserialize_with = "lenient_string")]
    content_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    campaign_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    area_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    media_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    play_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    play_timeout: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    play_order: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    duration: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    start_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    end_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    file_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    file_hash: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    file_extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    file_size: Option<i64>,
    #[serde(default)]
    time_targeting: Value,
    #[serde(default)]
    geo_targeting: Value,
}

/// Accept strings and numbers as ids; null becomes `None`
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept arrays; null or any other shape becomes an empty list
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Accept numbers and numeric strings; anything else becomes `None`
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_as_i64(&Value::deserialize(deserializer)?))
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

impl PlaybackConfig {
    /// Parse a manifest document, skipping invalid entries
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use signage_fetcher::app::manifest::PlaybackConfig;
    ///
    /// let config = PlaybackConfig::from_json_str(r#"{"campaigns": []}"#)?;
    /// assert!(config.is_empty());
    /// # Ok::<(), signage_fetcher::errors::ManifestError>(())
    /// ```
    pub fn from_json_str(json: &str) -> ManifestResult<Self> {
        Ok(parse_manifest(json)?.config)
    }

    /// Read and parse a manifest file
    pub async fn from_file(path: &Path) -> ManifestResult<Self> {
        Ok(parse_manifest_file(path).await?.config)
    }
}

/// Read and parse a manifest file, keeping the rejection report
pub async fn parse_manifest_file(path: &Path) -> ManifestResult<ParsedManifest> {
    if !path.exists() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let json = tokio::fs::read_to_string(path).await?;
    parse_manifest(&json)
}

/// Parse a manifest document, keeping the rejection report
pub fn parse_manifest(json: &str) -> ManifestResult<ParsedManifest> {
    let wire: WireManifest = serde_json::from_str(json)?;
    let mut stats = ManifestStats::default();
    let mut rejected = Vec::new();
    let mut campaigns = Vec::with_capacity(wire.campaigns.len());

    for (index, raw) in wire.campaigns.into_iter().enumerate() {
        match parse_campaign(index, raw, &mut stats, &mut rejected) {
            Ok(campaign) => {
                stats.campaigns_parsed += 1;
                campaigns.push(campaign);
            }
            Err(e) => {
                warn!("Skipping campaign: {}", e);
                stats.campaigns_skipped += 1;
                rejected.push(e);
            }
        }
    }

    info!(
        "Parsed manifest: {} campaigns, {} items ({} entries skipped)",
        stats.campaigns_parsed,
        stats.items_parsed,
        stats.total_skipped()
    );

    Ok(ParsedManifest {
        config: PlaybackConfig {
            last_modified: wire.last_modified,
            hash: wire.hash,
            campaigns,
        },
        stats,
        rejected,
    })
}

fn parse_campaign(
    index: usize,
    raw: Value,
    stats: &mut ManifestStats,
    rejected: &mut Vec<ManifestError>,
) -> ManifestResult<Campaign> {
    let wire: WireCampaign = decode(raw).map_err(|e| ManifestError::InvalidCampaign {
        campaign_id: format!("#{}", index),
        reason: e.to_string(),
    })?;

    let id = wire
        .campaign_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ManifestError::InvalidCampaign {
            campaign_id: format!("#{}", index),
            reason: "missing campaign_id".to_string(),
        })?;

    let mut areas = Vec::with_capacity(wire.areas.len());
    for (area_index, raw_area) in wire.areas.into_iter().enumerate() {
        match parse_area(&id, area_index, raw_area, stats, rejected) {
            Ok(area) => {
                stats.areas_parsed += 1;
                areas.push(area);
            }
            Err(e) => {
                warn!("Skipping area in campaign {}: {}", id, e);
                stats.areas_skipped += 1;
                rejected.push(e);
            }
        }
    }

    let duration_ms = wire.duration.unwrap_or(0).max(0) as u64;
    Ok(Campaign {
        duration: Duration::from_millis(duration_ms),
        window: DateRange::new(
            DateRange::parse_bound(wire.start_timestamp.as_deref()),
            DateRange::parse_bound(wire.end_timestamp.as_deref()),
        ),
        play_order: wire.play_order.unwrap_or(0),
        width: wire.width.unwrap_or(0),
        height: wire.height.unwrap_or(0),
        content_spacing: wire.content_spacing.unwrap_or(0),
        portrait: wire
            .orientation
            .as_deref()
            .is_some_and(|o| o.eq_ignore_ascii_case("portrait")),
        id,
        areas,
    })
}

fn parse_area(
    campaign_id: &str,
    index: usize,
    raw: Value,
    stats: &mut ManifestStats,
    rejected: &mut Vec<ManifestError>,
) -> ManifestResult<Area> {
    let invalid = |reason: String| ManifestError::InvalidCampaign {
        campaign_id: campaign_id.to_string(),
        reason: format!("area #{}: {}", index, reason),
    };

    let wire: WireArea = decode(raw).map_err(|e| invalid(e.to_string()))?;
    let id = wire
        .area_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| invalid("missing area_id".to_string()))?;

    let mut content = Vec::with_capacity(wire.content.len());
    for raw_item in wire.content {
        match parse_content(campaign_id, &id, raw_item) {
            Ok(item) => {
                stats.items_parsed += 1;
                content.push(item);
            }
            Err(e) => {
                warn!("Skipping content in area {}: {}", id, e);
                stats.items_skipped += 1;
                rejected.push(e);
            }
        }
    }

    let priority_content = wire
        .priority_content
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    Ok(Area {
        kind: wire.kind.unwrap_or_default(),
        geometry: AreaGeometry {
            x: wire.x.unwrap_or(0),
            y: wire.y.unwrap_or(0),
            width: wire.width.unwrap_or(0),
            height: wire.height.unwrap_or(0),
            opacity: wire.opacity.map_or(1.0, |o| o.clamp(0, 100) as f64 / 100.0),
            z_index: wire.z_index.unwrap_or(0),
        },
        sound_enabled: wire.sound_enabled.unwrap_or(false),
        id,
        content,
        priority_content,
    })
}

fn parse_content(campaign_id: &str, area_id: &str, raw: Value) -> ManifestResult<ContentItem> {
    let wire: WireContent = decode(raw).map_err(|e| ManifestError::InvalidContent {
        content_id: "<unknown>".to_string(),
        reason: e.to_string(),
    })?;

    let id = wire
        .content_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ManifestError::InvalidContent {
            content_id: "<unknown>".to_string(),
            reason: "missing content_id".to_string(),
        })?;

    // The id becomes part of a file name
    if id.contains(&['/', '\\'][..]) || id == "." || id == ".." {
        return Err(ManifestError::InvalidContent {
            content_id: id,
            reason: "content_id is not usable as a file name".to_string(),
        });
    }

    let tag = wire.media_type.clone().unwrap_or_default();
    let media_type = MediaType::from_tag(&tag).ok_or_else(|| ManifestError::UnknownMediaType {
        content_id: id.clone(),
        media_type: tag,
    })?;

    let (file, online_url) = if media_type.is_downloadable() {
        (Some(parse_file_ref(&id, &wire)?), None)
    } else {
        (None, wire.file_url.clone())
    };

    let time_targeting = parse_time_targeting(&wire.time_targeting);
    let geo_fence = parse_geo_fence(&id, &wire.geo_targeting);

    Ok(ContentItem {
        campaign_id: wire
            .campaign_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| campaign_id.to_string()),
        area_id: wire
            .area_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| area_id.to_string()),
        name: wire.name.unwrap_or_default(),
        media_type,
        play_type: PlayType::from_tag(wire.play_type.as_deref()),
        delay: Duration::from_secs(wire.play_timeout.unwrap_or(0).max(0) as u64),
        duration: Duration::from_secs(wire.duration.unwrap_or(0).max(0) as u64),
        play_order: wire.play_order.unwrap_or(0),
        file,
        online_url,
        date_range: DateRange::new(
            DateRange::parse_bound(wire.start_timestamp.as_deref()),
            DateRange::parse_bound(wire.end_timestamp.as_deref()),
        ),
        time_targeting,
        geo_fence,
        id,
    })
}

/// `{"<day>": [hours]}`; malformed days and hours are ignored
fn parse_time_targeting(raw: &Value) -> TimeTargeting {
    let Value::Object(days) = raw else {
        return TimeTargeting::default();
    };
    TimeTargeting::from_day_keys(days.iter().map(|(day, hours)| {
        let hours: Vec<u32> = hours
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(value_as_i64)
                    .filter_map(|h| u32::try_from(h).ok())
                    .collect()
            })
            .unwrap_or_default();
        (day.clone(), hours)
    }))
}

/// `[[{latitude, longitude}, ...], ...]`; empty shapes are dropped
fn parse_geo_fence(content_id: &str, raw: &Value) -> GeoFence {
    let Value::Array(shapes) = raw else {
        return GeoFence::default();
    };
    let polygons = shapes
        .iter()
        .filter_map(|shape| {
            let points: Vec<GeoPoint> = shape
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter_map(|p| {
                            Some(GeoPoint::new(
                                p.get("latitude")?.as_f64()?,
                                p.get("longitude")?.as_f64()?,
                            ))
                        })
                        .collect()
                })
                .unwrap_or_default();
            let polygon = Polygon::from_points(&points);
            if polygon.is_none() {
                debug!("Dropping empty geo polygon for content {}", content_id);
            }
            polygon
        })
        .collect();
    GeoFence::new(polygons)
}

fn parse_file_ref(content_id: &str, wire: &WireContent) -> ManifestResult<FileRef> {
    let missing = |field: &str| ManifestError::InvalidContent {
        content_id: content_id.to_string(),
        reason: format!("missing {}", field),
    };

    let raw_url = wire.file_url.as_deref().ok_or_else(|| missing("file_url"))?;
    let url = Url::parse(raw_url).map_err(|e| ManifestError::InvalidUrl {
        url: raw_url.to_string(),
        error: e.to_string(),
    })?;

    let hash = Md5Hash::from_hex(wire.file_hash.as_deref().ok_or_else(|| missing("file_hash"))?)?;

    let size = wire
        .file_size
        .filter(|s| *s >= 0)
        .ok_or_else(|| missing("file_size"))? as u64;

    let extension = match wire.file_extension.as_deref().map(str::trim) {
        Some(ext) if !ext.is_empty() => normalize_extension(ext),
        _ => extension_from_url(&url),
    };

    if extension.contains(&['/', '\\'][..]) {
        return Err(ManifestError::InvalidContent {
            content_id: content_id.to_string(),
            reason: format!("file_extension '{}' is not usable as a file name", extension),
        });
    }

    Ok(FileRef {
        url,
        hash,
        size,
        extension,
    })
}

fn normalize_extension(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

/// Last `.suffix` of the URL path, or empty
fn extension_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default()
}
