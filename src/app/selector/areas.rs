//! Per-area selector registry

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::app::manifest::{Campaign, ContentItem};
use crate::app::selector::PlaylistSelector;
use crate::app::state::PlaybackContext;

/// One [`PlaylistSelector`] per display area of the active campaign
#[derive(Debug)]
pub struct AreaPlaylists {
    context: Arc<PlaybackContext>,
    selectors: BTreeMap<String, PlaylistSelector>,
    seed: Option<u64>,
}

impl AreaPlaylists {
    pub fn new(context: Arc<PlaybackContext>) -> Self {
        Self {
            context,
            selectors: BTreeMap::new(),
            seed: None,
        }
    }

    /// Seed every selector created from now on, for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Rebuild selectors for the areas of `campaign`
    ///
    /// Selectors for areas that still exist keep their recency history.
    pub fn load_campaign(&mut self, campaign: &Campaign) {
        self.selectors
            .retain(|area_id, _| campaign.area(area_id).is_some());

        let context = &self.context;
        let seed = self.seed;
        for (index, area) in campaign.areas.iter().enumerate() {
            let selector = self.selectors.entry(area.id.clone()).or_insert_with(|| {
                let selector = PlaylistSelector::new(area.id.clone(), context.clone());
                match seed {
                    Some(seed) => selector.with_seed(seed.wrapping_add(index as u64)),
                    None => selector,
                }
            });
            selector.update_items(&area.content);
        }

        debug!(
            "Loaded campaign {} with {} areas",
            campaign.id,
            self.selectors.len()
        );
    }

    /// Drop every selector
    pub fn clear(&mut self) {
        self.selectors.clear();
    }

    pub fn area_ids(&self) -> impl Iterator<Item = &str> {
        self.selectors.keys().map(String::as_str)
    }

    pub fn selector(&self, area_id: &str) -> Option<&PlaylistSelector> {
        self.selectors.get(area_id)
    }

    /// Next item for `area_id`; `None` for unknown areas or no eligible content
    pub fn next(&mut self, area_id: &str) -> Option<String> {
        self.selectors.get_mut(area_id)?.next()
    }

    pub fn have_next(&self, area_id: &str) -> bool {
        self.selectors
            .get(area_id)
            .is_some_and(PlaylistSelector::have_next)
    }

    /// Whether any area has something it could play
    pub fn any_have_next(&self) -> bool {
        self.selectors.values().any(PlaylistSelector::have_next)
    }

    pub fn find_item_by_id(&self, area_id: &str, content_id: &str) -> Option<&ContentItem> {
        self.selectors.get(area_id)?.find_item_by_id(content_id)
    }
}
