//! Integration tests for the player coordinator
//!
//! These tests share one coordinator between a download pass and a front end
//! asking for content, the way a device runs them side by side.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_test::assert_ok;
use url::Url;

use signage_fetcher::app::cache::{CacheConfig, CacheManager};
use signage_fetcher::app::client::{TransferResponse, Transport};
use signage_fetcher::app::coordinator::{
    CoordinatorConfig, PlayerConfig, PlayerCoordinator, PlayerStatus,
};
use signage_fetcher::app::hash::Md5Hash;
use signage_fetcher::app::manifest::{parse_manifest, PlaybackConfig};
use signage_fetcher::app::swapper::SwapConfig;
use signage_fetcher::app::sync::{EventSink, SyncConfig};
use signage_fetcher::errors::DownloadResult;

const CLIP: &[u8] = b"frames of a short promotional clip";

/// Serves the whole clip for every request
struct ClipServer;

#[async_trait]
impl Transport for ClipServer {
    async fn fetch(&self, _url: &Url, offset: u64) -> DownloadResult<TransferResponse> {
        let data = Bytes::from_static(CLIP).slice(offset as usize..);
        Ok(TransferResponse {
            start_offset: offset,
            total_len: Some(CLIP.len() as u64),
            body: futures::stream::iter(vec![Ok(data)]).boxed(),
        })
    }
}

async fn player(temp_dir: &TempDir) -> Arc<PlayerCoordinator> {
    let cache = Arc::new(assert_ok!(
        CacheManager::new(CacheConfig::with_cache_root(temp_dir.path().to_path_buf())).await
    ));
    let config = CoordinatorConfig::default()
        .with_sync(
            SyncConfig::default()
                .with_activation_grace(Duration::ZERO)
                .with_reconnect_backoff(Duration::from_millis(10)),
        )
        .with_swap(SwapConfig {
            tick_interval: Duration::from_millis(10),
        })
        .with_player(PlayerConfig::default().with_seed(5));

    Arc::new(PlayerCoordinator::new(
        config,
        cache,
        Arc::new(ClipServer),
        EventSink::disabled(),
    ))
}

/// A downloadable clip next to an online page that is always playable
fn clip_and_board() -> PlaybackConfig {
    let json = format!(
        r#"{{"campaigns": [{{"campaign_id": "c1", "duration": 30000,
            "areas": [{{"area_id": "main", "content": [
                {{"content_id": "clip", "type": "video", "play_type": "fixed",
                  "file_url": "https://cdn.example.com/clip.mp4",
                  "file_hash": "{hash}", "file_size": {size}}},
                {{"content_id": "board", "type": "html5_online", "play_type": "free",
                  "file_url": "https://pages.example.com/board"}}
            ]}}]}}]}}"#,
        hash = Md5Hash::compute(CLIP).to_hex(),
        size = CLIP.len(),
    );
    assert_ok!(parse_manifest(&json)).config
}

#[tokio::test]
async fn test_selection_continues_while_pass_waits_for_swap() {
    let temp_dir = TempDir::new().unwrap();
    let player = player(&temp_dir).await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let swapper = player.spawn_swapper(shutdown_rx);

    let status = player.apply_manifest(clip_and_board()).await;
    assert_eq!(status, PlayerStatus::Ready);
    assert_eq!(player.last_check().pending, 1);

    // The front end still shows the old copy of the clip
    player.set_currently_playing(Some("clip"));
    let pass = tokio::spawn({
        let player = player.clone();
        async move { player.run_sync_pass().await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pass.is_finished());

    // Selection answers from another task while the pass is held open
    assert!(player.have_next("main"));
    assert_eq!(player.next("main").as_deref(), Some("board"));
    assert!(player.find_item_by_id("main", "clip").is_some());
    assert_eq!(player.status(), PlayerStatus::Ready);

    // Moving on releases the swap and the pass finishes
    player.set_currently_playing(Some("board"));
    let report = assert_ok!(assert_ok!(
        tokio::time::timeout(Duration::from_secs(5), pass).await
    ));

    assert_eq!(report.completed, vec!["clip".to_string()]);
    assert_eq!(player.last_check().pending, 0);
    assert!(player.context().is_activated("clip"));
    assert_eq!(player.next("main").as_deref(), Some("clip"));

    shutdown_tx.send(()).unwrap();
    assert_ok!(swapper.await);
}
