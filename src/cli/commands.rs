//! Command handlers for Signage Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments to
//! the player coordinator: loading manifests, running download passes,
//! simulating playlist selection and managing the configuration file.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::app::coordinator::{create_shutdown_channel, spawn_signal_listener};
use crate::app::manifest::{GeoPoint, ManifestSource, ParsedManifest};
use crate::app::sync::EventSink;
use crate::app::{
    CacheManager, ClientConfig, HttpTransport, PlayerCoordinator, PlayerStatus, SyncReport,
};
use crate::cli::{
    spawn_progress, CheckArgs, ConfigAction, ConfigArgs, NextArgs, ProgressConfig, SyncArgs,
};
use crate::config::{AppConfig, RuntimeConfig};
use crate::errors::{AppError, Result};

/// Runtime configuration with the global `--cache-dir` override applied
fn runtime_config(config: &AppConfig, cache_dir: Option<&Path>) -> Result<RuntimeConfig> {
    let mut runtime = config.to_runtime_config()?;
    if let Some(dir) = cache_dir {
        runtime.cache.cache_root = Some(dir.to_path_buf());
    }
    Ok(runtime)
}

/// Read a manifest and report entries that were skipped
async fn load_manifest(source: &ManifestSource, client: &ClientConfig) -> Result<ParsedManifest> {
    let transport = HttpTransport::new(client.clone())?;
    let parsed = source.load(&transport).await?;

    info!(
        "Loaded manifest from {}: {} campaigns, {} items ({} entries skipped)",
        source,
        parsed.config.campaigns.len(),
        parsed.config.item_count(),
        parsed.stats.total_skipped()
    );
    for rejected in &parsed.rejected {
        warn!("Skipped manifest entry: {}", rejected);
    }

    Ok(parsed)
}

async fn build_player(runtime: &RuntimeConfig, events: EventSink) -> Result<PlayerCoordinator> {
    let cache = Arc::new(CacheManager::new(runtime.cache.clone()).await?);
    let transport = Arc::new(HttpTransport::new(runtime.client.clone())?);
    Ok(PlayerCoordinator::new(
        runtime.coordinator.clone(),
        cache,
        transport,
        events,
    ))
}

/// Handle the sync command
///
/// Reconciles the cache with the manifest, downloads everything missing and
/// waits for the files to be swapped in and activated. With `--watch` the
/// manifest is reloaded and the pass repeated until a shutdown signal.
pub async fn handle_sync(
    args: SyncArgs,
    config: &AppConfig,
    cache_dir: Option<&Path>,
) -> Result<()> {
    let start_time = Instant::now();
    let source = ManifestSource::parse(&args.manifest)?;
    let runtime = runtime_config(config, cache_dir)?;

    let (events, receiver) = EventSink::channel(runtime.coordinator.sync.event_buffer_size);
    let progress = spawn_progress(
        receiver,
        ProgressConfig {
            enable_progress_bars: !args.no_progress,
            show_item_lines: true,
        },
    );

    let player = build_player(&runtime, events).await?;

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let signal_task = spawn_signal_listener(shutdown_tx.clone());
    let swapper_task = player.spawn_swapper(shutdown_rx);
    let mut watch_shutdown = shutdown_tx.subscribe();

    let mut totals = SyncReport::default();
    let result = loop {
        let outcome = tokio::select! {
            outcome = sync_once(&player, &source, &runtime.client) => outcome,
            _ = watch_shutdown.recv() => {
                info!("Shutdown requested, abandoning the current pass");
                break Ok(());
            }
        };
        let report = match outcome {
            Ok(report) => report,
            Err(e) if args.watch.is_some() && e.is_recoverable() => {
                warn!("Sync failed, retrying on next cycle: {}", e);
                SyncReport::default()
            }
            Err(e) => break Err(e),
        };
        totals.completed.extend(report.completed);
        totals.failed.extend(report.failed);
        totals.bytes_downloaded += report.bytes_downloaded;
        totals.resumed += report.resumed;
        totals.retries += report.retries;

        let Some(interval) = args.watch else {
            break Ok(());
        };

        debug!("Next sync in {}s", interval);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = watch_shutdown.recv() => break Ok(()),
        }
    };

    let status = player.status();
    let check = player.last_check();

    // Stop the swapper and close the event channel before collecting the display
    let _ = shutdown_tx.send(());
    if let Err(e) = swapper_task.await {
        warn!("Swapper task ended abnormally: {}", e);
    }
    signal_task.abort();
    drop(player);
    let summary = progress.await.unwrap_or_default();

    result?;

    println!("\n📊 Sync Summary:");
    println!("  Activated: {}", totals.completed.len());
    println!("  Failed: {}", totals.failed.len());
    println!("  Downloaded: {} bytes", totals.bytes_downloaded);
    println!("  Resumed transfers: {}", totals.resumed);
    println!("  Network retries: {}", totals.retries);
    println!("  Still pending: {}", check.pending);
    println!("  Player status: {}", status);
    println!("  Total time: {:?}", start_time.elapsed());
    debug!("Progress display summary: {:?}", summary);

    if !totals.failed.is_empty() {
        println!("\nFailed items:");
        for (content_id, reason) in &totals.failed {
            println!("  • {}: {}", content_id, reason);
        }
        return Err(AppError::generic(format!(
            "{} items could not be downloaded",
            totals.failed.len()
        )));
    }

    Ok(())
}

async fn sync_once(
    player: &PlayerCoordinator,
    source: &ManifestSource,
    client: &ClientConfig,
) -> Result<SyncReport> {
    let parsed = load_manifest(source, client).await?;
    let status = player.apply_manifest(parsed.config).await;
    let check = player.last_check();
    info!(
        "Reconciled cache: {} ready, {} to download ({})",
        check.ready, check.pending, status
    );

    if check.is_complete() {
        return Ok(SyncReport::default());
    }

    let report = player.run_sync_pass().await;
    for (content_id, reason) in &report.failed {
        error!("Download of {} failed: {}", content_id, reason);
    }
    Ok(report)
}

/// Handle the check command
///
/// Reconciles the cache against the manifest without downloading anything.
pub async fn handle_check(
    args: CheckArgs,
    config: &AppConfig,
    cache_dir: Option<&Path>,
) -> Result<()> {
    let source = ManifestSource::parse(&args.manifest)?;
    let runtime = runtime_config(config, cache_dir)?;
    let parsed = load_manifest(&source, &runtime.client).await?;

    let campaigns = parsed.config.campaigns.len();
    let items = parsed.config.item_count();
    let skipped = parsed.stats.total_skipped();

    let player = build_player(&runtime, EventSink::disabled()).await?;
    let status = player.apply_manifest(parsed.config).await;
    let check = player.last_check();

    println!("📋 Cache Check");
    println!("==============");
    println!("Manifest:   {}", source);
    println!("Campaigns:  {}", campaigns);
    println!("Items:      {}", items);
    if skipped > 0 {
        println!("Skipped:    {} invalid entries", skipped);
    }
    println!("Ready:      {}", check.ready);
    println!("To fetch:   {}", check.pending);
    println!("Status:     {}", status);

    if args.list {
        let queued = player.synchronizer().queued_ids();
        if !queued.is_empty() {
            println!("\nDownload queue:");
            for (i, id) in queued.iter().enumerate() {
                println!("  {}. {}", i + 1, id);
            }
        }
    }

    if check.is_complete() {
        println!("\n✅ Cache is up to date");
    } else {
        println!("\n📥 To download: signage_fetcher sync --manifest {}", source);
    }

    Ok(())
}

/// Handle the next command
///
/// Builds the playlists from the cached files and prints the ids a player
/// would show next, marking each one as playing in turn.
pub async fn handle_next(
    args: NextArgs,
    config: &AppConfig,
    cache_dir: Option<&Path>,
) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let source = ManifestSource::parse(&args.manifest)?;
    let mut runtime = runtime_config(config, cache_dir)?;
    if let (Some(lat), Some(long)) = (args.lat, args.long) {
        runtime.coordinator.player = runtime
            .coordinator
            .player
            .clone()
            .with_location(GeoPoint::new(lat, long));
    }

    let parsed = load_manifest(&source, &runtime.client).await?;
    let player = build_player(&runtime, EventSink::disabled()).await?;
    let status = player.apply_manifest(parsed.config).await;

    let Some(campaign) = player.current_campaign() else {
        println!("ℹ️  No campaign is valid right now");
        return Ok(());
    };
    println!("🎬 Campaign {} ({})", campaign.id, status);

    if status == PlayerStatus::Downloading {
        println!("   Some content is not cached yet; run 'signage_fetcher sync' first.");
    }

    let areas = match &args.area {
        Some(area) => {
            if !player.area_ids().contains(area) {
                return Err(AppError::generic(format!(
                    "Area '{}' is not part of campaign {}",
                    area, campaign.id
                )));
            }
            vec![area.clone()]
        }
        None => player.area_ids(),
    };

    for area in areas {
        println!("\nArea {}:", area);
        for step in 1..=args.count {
            match player.next(&area) {
                Some(id) => {
                    let kind = player
                        .find_item_by_id(&area, &id)
                        .map(|item| format!("{:?}/{:?}", item.media_type, item.play_type))
                        .unwrap_or_default();
                    println!("  {}. {} {}", step, id, kind);
                    player.set_currently_playing(Some(id.as_str()));
                }
                None => {
                    println!("  {}. (nothing eligible)", step);
                    player.set_currently_playing(None);
                }
            }
        }
    }
    player.set_currently_playing(None);

    Ok(())
}

/// Handle configuration management commands
pub async fn handle_config(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => AppConfig::get_default_config_path()?,
            };

            if path.exists() && !force {
                println!("✅ Configuration already exists at {}", path.display());
                println!("   Use --force to overwrite it.");
                return Ok(());
            }

            AppConfig::write_default_config(&path).await?;
            println!("📁 Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            // Validate before printing so a broken file is reported
            config.to_runtime_config()?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
