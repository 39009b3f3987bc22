//! Progress display for download passes
//!
//! Renders [`SyncEvent`]s with an `indicatif` byte bar on a terminal and
//! falls back to plain lines on stderr otherwise. The display only consumes
//! events; nothing it does feeds back into the synchronizer.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::sync::SyncEvent;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Print per-item lines in text mode
    pub show_item_lines: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            show_item_lines: true,
        }
    }
}

/// Counts collected while displaying a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub started: usize,
    pub ready: usize,
    pub failed: usize,
}

/// Event-driven progress renderer
pub struct ProgressDisplay {
    config: ProgressConfig,
    bar: Option<ProgressBar>,
    summary: ProgressSummary,
}

impl ProgressDisplay {
    /// Create a display, using a bar only when stderr is a terminal
    pub fn new(config: ProgressConfig) -> Self {
        let use_bar = config.enable_progress_bars && std::io::stderr().is_terminal();
        let bar = use_bar.then(|| {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} {msg}",
                )
                .map(|style| style.progress_chars("##-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        });

        Self {
            config,
            bar,
            summary: ProgressSummary::default(),
        }
    }

    pub fn summary(&self) -> ProgressSummary {
        self.summary
    }

    /// Update the display with one event
    pub fn handle(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::CheckCompleted { pending, ready } => {
                self.line(format!("{} items to download, {} already cached", pending, ready));
            }
            SyncEvent::ItemStarted {
                content_id,
                index,
                total,
                size,
            } => {
                self.summary.started += 1;
                match &self.bar {
                    Some(bar) => {
                        bar.set_length(*size);
                        bar.set_position(0);
                        bar.set_message(format!("{} ({}/{})", content_id, index + 1, total));
                    }
                    None if self.config.show_item_lines => eprintln!(
                        "Downloading {} ({}/{}, {} bytes)",
                        content_id,
                        index + 1,
                        total,
                        size
                    ),
                    None => {}
                }
            }
            SyncEvent::ItemProgress { received, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(*received);
                }
            }
            SyncEvent::TotalProgress { .. } => {}
            SyncEvent::ItemReady { content_id } => {
                self.summary.ready += 1;
                self.line(format!("✅ {} ready", content_id));
            }
            SyncEvent::ItemFailed { content_id, reason } => {
                self.summary.failed += 1;
                self.line(format!("⚠️  {} failed: {}", content_id, reason));
            }
            SyncEvent::PassCompleted { completed, failed } => {
                if let Some(bar) = &self.bar {
                    bar.finish_and_clear();
                }
                debug!("Pass completed: {} completed, {} failed", completed, failed);
            }
        }
    }

    fn line(&self, message: String) {
        match &self.bar {
            Some(bar) => bar.println(message),
            None if self.config.show_item_lines => eprintln!("{}", message),
            None => {}
        }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Drain `receiver` into a display until every sender is gone
pub fn spawn_progress(
    mut receiver: mpsc::Receiver<SyncEvent>,
    config: ProgressConfig,
) -> JoinHandle<ProgressSummary> {
    tokio::spawn(async move {
        let mut display = ProgressDisplay::new(config);
        while let Some(event) = receiver.recv().await {
            display.handle(&event);
        }
        display.finish();
        display.summary()
    })
}
