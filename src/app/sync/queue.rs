//! Download ordering
//!
//! Items flagged high priority go first, then free-play filler, then
//! everything else. The sort is stable, so manifest order breaks ties, and an
//! id listed in several areas is downloaded once at its first position.

use std::collections::HashSet;

use crate::app::manifest::{ContentItem, PlayType};
use crate::app::state::PlaybackContext;

fn rank(item: &ContentItem, context: &PlaybackContext) -> u8 {
    if context.is_priority(&item.id) {
        0
    } else if item.play_type == PlayType::Free {
        1
    } else {
        2
    }
}

/// Order items needing a download, dropping repeated ids
pub fn order_download_queue(
    items: impl IntoIterator<Item = ContentItem>,
    context: &PlaybackContext,
) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    let mut queue: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();
    queue.sort_by_key(|item| rank(item, context));
    queue
}
