//! Integration tests for content synchronization
//!
//! These tests drive the synchronizer and the file swapper together against
//! an in-memory transport, checking resume offsets, verification failures
//! and the activation handshake on a real temporary cache directory.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::broadcast;
use url::Url;

use signage_fetcher::app::cache::{CacheConfig, CacheManager};
use signage_fetcher::app::client::{TransferResponse, Transport};
use signage_fetcher::app::hash::Md5Hash;
use signage_fetcher::app::manifest::{parse_manifest, ContentItem, PlaybackConfig};
use signage_fetcher::app::state::PlaybackContext;
use signage_fetcher::app::swapper::{FileSwapper, SwapConfig};
use signage_fetcher::app::sync::{ContentSynchronizer, EventSink, SyncConfig, SyncEvent};
use signage_fetcher::errors::{DownloadError, DownloadResult};

const CHUNK: usize = 4;

/// Serves one payload, honouring byte ranges unless told otherwise
struct FakeTransport {
    payload: Bytes,
    offsets: Mutex<Vec<u64>>,
    /// Requests that fail before any byte is sent
    refuse: Mutex<usize>,
    /// Next response breaks off after this many bytes
    interrupt_after: Mutex<Option<usize>>,
    /// Respond to ranged requests with the whole payload
    ignore_range: bool,
    /// Serve bytes that do not match the payload hash
    corrupt: bool,
    /// Answer ranged requests from a byte past the one asked for
    misalign_ranges: bool,
}

impl FakeTransport {
    fn new(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
            offsets: Mutex::new(Vec::new()),
            refuse: Mutex::new(0),
            interrupt_after: Mutex::new(None),
            ignore_range: false,
            corrupt: false,
            misalign_ranges: false,
        }
    }

    fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, _url: &Url, offset: u64) -> DownloadResult<TransferResponse> {
        self.offsets.lock().push(offset);

        {
            let mut refuse = self.refuse.lock();
            if *refuse > 0 {
                *refuse -= 1;
                return Err(DownloadError::ServerError { status: 503 });
            }
        }

        let start = if self.ignore_range {
            0
        } else if self.misalign_ranges && offset > 0 {
            (offset as usize + 3).min(self.payload.len())
        } else {
            offset as usize
        };
        let mut data = self.payload.slice(start..);
        if self.corrupt {
            data = Bytes::from(data.iter().map(|b| b ^ 0xff).collect::<Vec<u8>>());
        }

        let mut chunks: Vec<DownloadResult<Bytes>> = Vec::new();
        let cut = self.interrupt_after.lock().take();
        match cut {
            Some(cut) => {
                chunks.push(Ok(data.slice(..cut.min(data.len()))));
                chunks.push(Err(DownloadError::Stream {
                    reason: "connection reset".to_string(),
                }));
            }
            None => {
                let mut rest = data;
                while !rest.is_empty() {
                    let n = rest.len().min(CHUNK);
                    chunks.push(Ok(rest.split_to(n)));
                }
            }
        }

        Ok(TransferResponse {
            start_offset: start as u64,
            total_len: Some(self.payload.len() as u64),
            body: futures::stream::iter(chunks).boxed(),
        })
    }
}

/// Synchronizer wired to a fake transport and a running swapper
struct Harness {
    _dir: TempDir,
    cache: Arc<CacheManager>,
    context: Arc<PlaybackContext>,
    synchronizer: Arc<ContentSynchronizer>,
    shutdown: broadcast::Sender<()>,
}

impl Harness {
    async fn new(transport: Arc<FakeTransport>, events: EventSink) -> Self {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(
            CacheManager::new(CacheConfig::with_cache_root(dir.path().to_path_buf()))
                .await
                .unwrap(),
        );
        let context = Arc::new(PlaybackContext::with_system_clock());
        let swapper = Arc::new(FileSwapper::new(
            context.clone(),
            SwapConfig {
                tick_interval: Duration::from_millis(10),
            },
        ));
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(swapper.clone().run(shutdown_rx));

        let config = SyncConfig::default()
            .with_activation_grace(Duration::ZERO)
            .with_reconnect_backoff(Duration::from_millis(10))
            .with_read_timeout(Duration::from_secs(5));
        let synchronizer = Arc::new(
            ContentSynchronizer::new(context.clone(), cache.clone(), transport, swapper, config)
                .with_events(events),
        );

        Self {
            _dir: dir,
            cache,
            context,
            synchronizer,
            shutdown,
        }
    }

    fn load(&self, manifest: PlaybackConfig) -> ContentItem {
        let item = manifest.items().next().unwrap().clone();
        self.synchronizer.update_manifest(Arc::new(manifest));
        item
    }

    fn main_path(&self, item: &ContentItem) -> std::path::PathBuf {
        self.cache.layout().item_paths(item).unwrap().main
    }

    fn temp_path(&self, item: &ContentItem) -> std::path::PathBuf {
        self.cache.layout().item_paths(item).unwrap().temp
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

fn manifest_for(id: &str, media_type: &str, payload: &[u8], extension: &str) -> PlaybackConfig {
    let json = format!(
        r#"{{"campaigns": [{{"campaign_id": "c1", "duration": 30000,
            "areas": [{{"area_id": "main", "content": [
                {{"content_id": "{id}", "type": "{media_type}", "play_type": "fixed",
                  "file_url": "https://cdn.example.com/{id}{extension}",
                  "file_hash": "{hash}", "file_size": {size}}}
            ]}}]}}]}}"#,
        id = id,
        media_type = media_type,
        extension = extension,
        hash = Md5Hash::compute(payload).to_hex(),
        size = payload.len(),
    );
    parse_manifest(&json).unwrap().config
}

const PAYLOAD: &[u8] = b"the quick brown fox jumps over the lazy dog";

#[tokio::test]
async fn test_fresh_download_is_swapped_in_and_activated() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));

    let check = harness.synchronizer.check_download().await;
    assert_eq!(check.pending, 1);
    assert!(!harness.context.is_activated("clip"));

    let report = harness.synchronizer.run_pass().await;
    assert_eq!(report.completed, vec!["clip".to_string()]);
    assert!(report.is_success());
    assert_eq!(report.bytes_downloaded, PAYLOAD.len() as u64);
    assert_eq!(transport.offsets(), vec![0]);

    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
    assert!(!harness.temp_path(&item).exists());
    assert!(harness.context.is_activated("clip"));

    // A second reconciliation finds the file in place
    let check = harness.synchronizer.check_download().await;
    assert_eq!(check.pending, 0);
    assert_eq!(check.ready, 1);
    // Only the cached main file keeps a digest; the renamed temp file does not
    assert_eq!(harness.cache.verifier().memo_len(), 1);
}

#[tokio::test]
async fn test_superseded_file_digests_are_dropped() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport, EventSink::disabled()).await;
    harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));

    harness.synchronizer.check_download().await;
    harness.synchronizer.run_pass().await;
    harness.synchronizer.check_download().await;
    assert_eq!(harness.cache.verifier().memo_len(), 1);

    // A new revision of the same item lives under a different file name
    harness.load(manifest_for("clip", "video", b"a newer cut of the clip", ".mp4"));
    let check = harness.synchronizer.check_download().await;
    assert_eq!(check.pending, 1);
    assert_eq!(harness.cache.verifier().memo_len(), 0);
}

#[tokio::test]
async fn test_partial_temp_file_resumes_at_its_length() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    std::fs::write(harness.temp_path(&item), &PAYLOAD[..10]).unwrap();

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;

    assert_eq!(transport.offsets(), vec![10]);
    assert_eq!(report.resumed, 1);
    assert_eq!(report.bytes_downloaded, (PAYLOAD.len() - 10) as u64);
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_complete_temp_file_needs_no_request() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    std::fs::write(harness.temp_path(&item), PAYLOAD).unwrap();

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;

    assert!(transport.offsets().is_empty());
    assert_eq!(report.completed, vec!["clip".to_string()]);
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_full_size_temp_file_with_wrong_hash_restarts() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    std::fs::write(harness.temp_path(&item), vec![b'x'; PAYLOAD.len()]).unwrap();

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;

    assert_eq!(transport.offsets(), vec![0]);
    assert!(report.is_success());
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_oversized_temp_file_restarts() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    std::fs::write(harness.temp_path(&item), vec![b'x'; PAYLOAD.len() + 3]).unwrap();

    harness.synchronizer.check_download().await;
    harness.synchronizer.run_pass().await;

    assert_eq!(transport.offsets(), vec![0]);
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_server_ignoring_range_truncates_temp_file() {
    let mut fake = FakeTransport::new(PAYLOAD);
    fake.ignore_range = true;
    let transport = Arc::new(fake);
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    std::fs::write(harness.temp_path(&item), &PAYLOAD[..7]).unwrap();

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;

    assert_eq!(transport.offsets(), vec![7]);
    assert!(report.is_success());
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_misaligned_range_reply_restarts_from_zero() {
    let mut fake = FakeTransport::new(PAYLOAD);
    fake.misalign_ranges = true;
    let transport = Arc::new(fake);
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    std::fs::write(harness.temp_path(&item), &PAYLOAD[..10]).unwrap();

    harness.synchronizer.check_download().await;
    let report = tokio::time::timeout(Duration::from_secs(5), harness.synchronizer.run_pass())
        .await
        .unwrap();

    // The partial file is dropped instead of asking for byte 10 again
    assert_eq!(transport.offsets(), vec![10, 0]);
    assert_eq!(report.retries, 0);
    assert_eq!(report.resumed, 0);
    assert!(report.is_success());
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_interrupted_transfer_resumes_after_backoff() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    *transport.interrupt_after.lock() = Some(12);
    *transport.refuse.lock() = 1;
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;

    // Refused, then cut off after 12 bytes, then resumed from there
    assert_eq!(transport.offsets(), vec![0, 0, 12]);
    assert_eq!(report.retries, 2);
    assert_eq!(report.resumed, 1);
    assert!(report.is_success());
    assert_eq!(std::fs::read(harness.main_path(&item)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_persistent_corruption_gives_up_for_the_pass() {
    let mut fake = FakeTransport::new(PAYLOAD);
    fake.corrupt = true;
    let transport = Arc::new(fake);
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;

    let retries = SyncConfig::default().integrity_retries as usize;
    assert_eq!(transport.offsets(), vec![0; retries + 1]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "clip");
    assert!(!harness.context.is_activated("clip"));
    assert!(!harness.main_path(&item).exists());
    assert!(!harness.temp_path(&item).exists());

    // Still queued for the next pass
    let check = harness.synchronizer.check_download().await;
    assert_eq!(check.pending, 1);
}

#[tokio::test]
async fn test_playing_item_waits_for_swap() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));
    harness.context.set_currently_playing(Some("clip"));

    harness.synchronizer.check_download().await;
    let synchronizer = harness.synchronizer.clone();
    let pass = tokio::spawn(async move { synchronizer.run_pass().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pass.is_finished());
    assert!(!harness.main_path(&item).exists());
    assert_eq!(std::fs::read(harness.temp_path(&item)).unwrap(), PAYLOAD);
    assert!(!harness.context.is_activated("clip"));

    harness.context.set_currently_playing(None);
    let report = tokio::time::timeout(Duration::from_secs(5), pass)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.completed, vec!["clip".to_string()]);
    assert!(harness.main_path(&item).exists());
    assert!(harness.context.is_activated("clip"));
}

#[tokio::test]
async fn test_events_follow_item_lifecycle() {
    let transport = Arc::new(FakeTransport::new(PAYLOAD));
    let (events, mut receiver) = EventSink::channel(256);
    let harness = Harness::new(transport, events).await;
    harness.load(manifest_for("clip", "video", PAYLOAD, ".mp4"));

    harness.synchronizer.check_download().await;
    harness.synchronizer.run_pass().await;

    let mut seen = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        seen.push(event);
    }

    assert_eq!(seen.first(), Some(&SyncEvent::CheckCompleted { pending: 1, ready: 0 }));
    assert!(seen.contains(&SyncEvent::ItemStarted {
        content_id: "clip".to_string(),
        index: 0,
        total: 1,
        size: PAYLOAD.len() as u64,
    }));
    assert!(seen.contains(&SyncEvent::ItemProgress {
        content_id: "clip".to_string(),
        received: PAYLOAD.len() as u64,
        total: PAYLOAD.len() as u64,
    }));

    let ready = seen
        .iter()
        .position(|e| matches!(e, SyncEvent::ItemReady { content_id } if content_id == "clip"))
        .unwrap();
    let completed = seen
        .iter()
        .position(|e| matches!(e, SyncEvent::PassCompleted { completed: 1, failed: 0 }))
        .unwrap();
    assert!(ready < completed);
}

fn bundle_archive() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("index.html", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"<html>menu</html>").unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_bundle_is_unpacked_and_restored() {
    let archive = bundle_archive();
    let transport = Arc::new(FakeTransport::new(&archive));
    let harness = Harness::new(transport.clone(), EventSink::disabled()).await;
    let item = harness.load(manifest_for("menu", "html5_zip", &archive, ".zip"));

    harness.synchronizer.check_download().await;
    let report = harness.synchronizer.run_pass().await;
    assert_eq!(report.completed, vec!["menu".to_string()]);

    let bundle_dir = harness.cache.layout().bundle_dir("menu");
    assert_eq!(
        std::fs::read_to_string(bundle_dir.join("index.html")).unwrap(),
        "<html>menu</html>"
    );
    assert!(harness.main_path(&item).exists());

    // A lost directory comes back from the cached archive without a download
    std::fs::remove_dir_all(&bundle_dir).unwrap();
    let check = harness.synchronizer.check_download().await;
    assert_eq!(check.ready, 1);
    assert!(bundle_dir.join("index.html").exists());
    assert_eq!(transport.offsets(), vec![0]);
}
