//! Integration tests for playlist selection
//!
//! These tests feed parsed manifests through the player coordinator on a
//! manually driven clock and check what each area is allowed to play.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use url::Url;

use signage_fetcher::app::cache::{CacheConfig, CacheManager};
use signage_fetcher::app::client::{TransferResponse, Transport};
use signage_fetcher::app::clock::ManualClock;
use signage_fetcher::app::coordinator::{CoordinatorConfig, PlayerConfig, PlayerCoordinator};
use signage_fetcher::app::manifest::{parse_manifest, GeoPoint, PlaybackConfig};
use signage_fetcher::app::state::PlaybackContext;
use signage_fetcher::app::sync::EventSink;
use signage_fetcher::errors::{DownloadError, DownloadResult};

/// Transport for manifests that only hold online pages
struct Offline;

#[async_trait]
impl Transport for Offline {
    async fn fetch(&self, url: &Url, _offset: u64) -> DownloadResult<TransferResponse> {
        Err(DownloadError::Stream {
            reason: format!("no network in tests: {}", url),
        })
    }
}

/// Monday 2 March 2026, 09:30 UTC
fn monday_morning() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

async fn player(temp_dir: &TempDir, clock: &ManualClock) -> PlayerCoordinator {
    let cache = Arc::new(
        CacheManager::new(CacheConfig::with_cache_root(temp_dir.path().to_path_buf()))
            .await
            .unwrap(),
    );
    let offset = FixedOffset::east_opt(0).unwrap();
    let context = Arc::new(PlaybackContext::new(Arc::new(clock.clone()), offset));

    PlayerCoordinator::with_context(
        CoordinatorConfig::default().with_player(PlayerConfig::default().with_seed(11)),
        context,
        cache,
        Arc::new(Offline),
        EventSink::disabled(),
    )
}

fn page(id: &str, play_type: &str) -> Value {
    json!({
        "content_id": id,
        "type": "html5_online",
        "play_type": play_type,
        "file_url": format!("https://pages.example.com/{}", id),
    })
}

fn single_area(content: Vec<Value>) -> PlaybackConfig {
    let manifest = json!({
        "campaigns": [{
            "campaign_id": "c1",
            "duration": 60000,
            "areas": [{"area_id": "main", "content": content}]
        }]
    });
    parse_manifest(&manifest.to_string()).unwrap().config
}

/// Square of roughly 20km around Berlin
fn berlin_fence() -> Value {
    json!([[
        {"latitude": 52.4, "longitude": 13.2},
        {"latitude": 52.4, "longitude": 13.6},
        {"latitude": 52.6, "longitude": 13.6},
        {"latitude": 52.6, "longitude": 13.2}
    ]])
}

#[tokio::test]
async fn test_selected_ids_always_come_from_the_area() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let mut content = Vec::new();
    for i in 0..3 {
        let mut item = page(&format!("fixed-{}", i), "fixed");
        item["play_timeout"] = json!(20);
        content.push(item);
    }
    content.push(page("floating-0", "none"));
    content.push(page("floating-1", "none"));
    content.push(page("filler", "free"));
    let expected: HashSet<String> = content
        .iter()
        .map(|item| item["content_id"].as_str().unwrap().to_string())
        .collect();

    player.apply_manifest(single_area(content)).await;

    for _ in 0..100 {
        let id = player.next("main").expect("online content is always playable");
        assert!(expected.contains(&id), "unexpected id {}", id);
        clock.advance_secs(7);
    }
}

#[tokio::test]
async fn test_fixed_items_respect_their_delay() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let mut promo = page("promo", "fixed");
    promo["play_timeout"] = json!(30);
    player
        .apply_manifest(single_area(vec![promo, page("filler", "free")]))
        .await;

    assert_eq!(player.next("main").as_deref(), Some("promo"));

    clock.advance_secs(29);
    assert_eq!(player.next("main").as_deref(), Some("filler"));

    clock.advance_secs(2);
    assert_eq!(player.next("main").as_deref(), Some("promo"));
}

#[tokio::test]
async fn test_oversized_delay_from_manifest_does_not_crash() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let mut promo = page("promo", "fixed");
    promo["play_timeout"] = json!(1_000_000_000_000_000i64);
    player
        .apply_manifest(single_area(vec![promo, page("filler", "free")]))
        .await;

    assert_eq!(player.next("main").as_deref(), Some("promo"));
    clock.advance_secs(3600);
    assert_eq!(player.next("main").as_deref(), Some("filler"));
}

#[tokio::test]
async fn test_recency_survives_manifest_reload() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let mut promo = page("promo", "fixed");
    promo["play_timeout"] = json!(60);
    let manifest = vec![promo, page("filler", "free")];

    player.apply_manifest(single_area(manifest.clone())).await;
    assert_eq!(player.next("main").as_deref(), Some("promo"));

    clock.advance_secs(10);
    player.apply_manifest(single_area(manifest)).await;
    assert_eq!(player.next("main").as_deref(), Some("filler"));
}

#[tokio::test]
async fn test_geofenced_item_follows_device_location() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let mut local = page("local", "fixed");
    local["geo_targeting"] = berlin_fence();
    player
        .apply_manifest(single_area(vec![local, page("filler", "free")]))
        .await;

    player
        .context()
        .set_location(Some(GeoPoint::new(52.52, 13.405)));
    assert_eq!(player.next("main").as_deref(), Some("local"));

    // Munich is outside the fence
    player
        .context()
        .set_location(Some(GeoPoint::new(48.137, 11.575)));
    for _ in 0..10 {
        assert_eq!(player.next("main").as_deref(), Some("filler"));
        clock.advance_secs(5);
    }

    // Without a known location the fence does not apply
    player.context().set_location(None);
    assert_eq!(player.next("main").as_deref(), Some("local"));
}

#[tokio::test]
async fn test_degenerate_fence_matches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let mut line = page("line", "none");
    line["geo_targeting"] = json!([[
        {"latitude": 52.0, "longitude": 13.0},
        {"latitude": 53.0, "longitude": 14.0}
    ]]);
    player.apply_manifest(single_area(vec![line])).await;

    player
        .context()
        .set_location(Some(GeoPoint::new(52.5, 13.5)));
    assert_eq!(player.next("main"), None);
}

#[tokio::test]
async fn test_time_targeting_limits_hours() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    // Monday is day "2", counting from Sunday
    let mut breakfast = page("breakfast", "free");
    breakfast["time_targeting"] = json!({"2": [8, 9]});
    player.apply_manifest(single_area(vec![breakfast])).await;

    assert_eq!(player.next("main").as_deref(), Some("breakfast"));

    clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
    assert_eq!(player.next("main"), None);

    // Tuesday is not listed at all
    clock.set(Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap());
    assert_eq!(player.next("main"), None);
}

#[tokio::test]
async fn test_expired_campaign_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(monday_morning());
    let player = player(&temp_dir, &clock).await;

    let manifest = json!({
        "campaigns": [
            {
                "campaign_id": "winter",
                "duration": 20000,
                "end_timestamp": "2026-02-28 23:59:59",
                "areas": [{"area_id": "main", "content": [page("snow", "fixed")]}]
            },
            {
                "campaign_id": "spring",
                "duration": 20000,
                "start_timestamp": "2026-03-01 00:00:00",
                "areas": [{"area_id": "main", "content": [page("flowers", "fixed")]}]
            }
        ]
    });
    let config = parse_manifest(&manifest.to_string()).unwrap().config;
    player.apply_manifest(config).await;

    assert_eq!(player.current_campaign().unwrap().id, "spring");
    assert_eq!(player.next("main").as_deref(), Some("flowers"));

    // Rotation comes back to the only valid campaign
    player.advance_campaign();
    assert_eq!(player.current_campaign().unwrap().id, "spring");
}
