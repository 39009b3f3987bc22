//! Integration tests for the file swapper
//!
//! These tests interleave swap ticks with changes of the currently playing
//! item and check that a file on screen is never replaced underneath it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_test::assert_ok;

use signage_fetcher::app::state::PlaybackContext;
use signage_fetcher::app::swapper::{FileSwapper, SwapConfig, SwapJob};

fn swap_config() -> SwapConfig {
    SwapConfig {
        tick_interval: Duration::from_millis(10),
    }
}

/// Write an old main file and a new temp file for `id`
fn stage(dir: &Path, id: &str) -> SwapJob {
    let main = dir.join(format!("{}.mp4", id));
    let temp = PathBuf::from(format!("{}_", main.display()));
    std::fs::write(&main, format!("old {}", id)).unwrap();
    std::fs::write(&temp, format!("new {}", id)).unwrap();
    SwapJob {
        content_id: id.to_string(),
        main,
        temp,
    }
}

fn contents(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_other_items_swap_while_one_plays() {
    let temp_dir = TempDir::new().unwrap();
    let context = Arc::new(PlaybackContext::with_system_clock());
    let swapper = FileSwapper::new(context.clone(), swap_config());

    let playing = stage(temp_dir.path(), "a");
    let idle = stage(temp_dir.path(), "b");
    context.set_currently_playing(Some("a"));

    let _playing_ticket = swapper.enqueue(playing.clone());
    let idle_ticket = swapper.enqueue(idle.clone());

    assert_eq!(swapper.tick().await, 1);
    assert_ok!(idle_ticket.wait().await);
    assert_eq!(contents(&idle.main), "new b");
    assert_eq!(contents(&playing.main), "old a");
    assert!(playing.temp.exists());
    assert_eq!(swapper.pending(), 1);
}

#[tokio::test]
async fn test_deferred_job_runs_once_playback_moves_on() {
    let temp_dir = TempDir::new().unwrap();
    let context = Arc::new(PlaybackContext::with_system_clock());
    let swapper = FileSwapper::new(context.clone(), swap_config());

    let first = stage(temp_dir.path(), "a");
    let second = stage(temp_dir.path(), "c");

    context.set_currently_playing(Some("a"));
    let first_ticket = swapper.enqueue(first.clone());
    assert_eq!(swapper.tick().await, 0);

    // Playback moves to the item queued second
    let second_ticket = swapper.enqueue(second.clone());
    context.set_currently_playing(Some("c"));
    assert_eq!(swapper.tick().await, 1);
    assert_ok!(first_ticket.wait().await);
    assert_eq!(contents(&first.main), "new a");
    assert_eq!(contents(&second.main), "old c");

    context.set_currently_playing(None);
    assert_eq!(swapper.tick().await, 1);
    assert_ok!(second_ticket.wait().await);
    assert_eq!(contents(&second.main), "new c");
    assert_eq!(swapper.pending(), 0);
}

#[tokio::test]
async fn test_run_loop_swaps_after_playback_stops() {
    let temp_dir = TempDir::new().unwrap();
    let context = Arc::new(PlaybackContext::with_system_clock());
    let swapper = Arc::new(FileSwapper::new(context.clone(), swap_config()));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(swapper.clone().run(shutdown_rx));

    let job = stage(temp_dir.path(), "a");
    context.set_currently_playing(Some("a"));
    let ticket = swapper.enqueue(job.clone());

    // Several ticks pass without touching the playing file
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(contents(&job.main), "old a");
    assert_eq!(swapper.pending(), 1);

    context.set_currently_playing(None);
    tokio::time::timeout(Duration::from_secs(2), ticket.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contents(&job.main), "new a");
    assert!(!job.temp.exists());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_idle_loop_wakes_on_enqueue() {
    let temp_dir = TempDir::new().unwrap();
    let context = Arc::new(PlaybackContext::with_system_clock());
    let swapper = Arc::new(FileSwapper::new(context, swap_config()));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(swapper.clone().run(shutdown_rx));

    // Let the loop park on an empty queue first
    tokio::time::sleep(Duration::from_millis(30)).await;

    let job = stage(temp_dir.path(), "b");
    let ticket = swapper.enqueue(job.clone());
    tokio::time::timeout(Duration::from_secs(2), ticket.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contents(&job.main), "new b");

    shutdown_tx.send(()).unwrap();
    task.await.unwrap();
}
