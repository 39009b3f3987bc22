//! Campaign rotation
//!
//! Campaigns take turns on screen. Each turn lasts the campaign's duration,
//! never less than [`MIN_CAMPAIGN_SLOT`]. Campaigns whose validity window
//! does not contain the current time are passed over.

use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::app::manifest::types::{Campaign, PlaybackConfig};
use crate::constants::manifest::MIN_CAMPAIGN_SLOT;

/// Cursor over the campaigns of the active manifest
#[derive(Debug, Clone, Default)]
pub struct CampaignRotation {
    current: usize,
}

impl CampaignRotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart from the first campaign, used after a manifest update
    pub fn reset(&mut self) {
        self.current = 0;
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Campaign under the cursor
    pub fn current<'a>(&self, config: &'a PlaybackConfig) -> Option<&'a Campaign> {
        config.campaigns.get(self.current)
    }

    /// Point at the first campaign valid at `now` and return its slot
    pub fn start(&mut self, config: &PlaybackConfig, now: NaiveDateTime) -> Option<Duration> {
        self.reset();
        let first = config.campaigns.first()?;
        if first.window.contains(now) {
            debug!("Starting rotation at campaign {}", first.id);
            return Some(first.duration.max(MIN_CAMPAIGN_SLOT));
        }
        self.advance(config, now)
    }

    /// Move to the next campaign that is valid at `now` and return its slot
    ///
    /// Wraps around the list. When no other campaign is valid the cursor
    /// comes back to where it started. Returns `None` for an empty manifest.
    pub fn advance(&mut self, config: &PlaybackConfig, now: NaiveDateTime) -> Option<Duration> {
        let count = config.campaigns.len();
        if count == 0 {
            self.current = 0;
            return None;
        }

        let start = self.current.min(count - 1);
        let mut candidate = start;
        loop {
            candidate = (candidate + 1) % count;
            if candidate == start || config.campaigns[candidate].window.contains(now) {
                break;
            }
        }

        self.current = candidate;
        let campaign = &config.campaigns[candidate];
        debug!("Rotated to campaign {}", campaign.id);
        Some(campaign.duration.max(MIN_CAMPAIGN_SLOT))
    }
}
