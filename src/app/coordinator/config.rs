//! Configuration structures for the player coordinator
//!
//! This module groups the settings the coordinator hands to the components
//! it owns, plus the device-specific player settings.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::app::manifest::GeoPoint;
use crate::app::swapper::SwapConfig;
use crate::app::sync::SyncConfig;

/// Device-specific playback settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Offset of device-local time from UTC in minutes; host offset when unset
    pub utc_offset_minutes: Option<i32>,
    /// Device position for geofenced content; geofences are ignored when unset
    pub location: Option<GeoPoint>,
    /// Seed for playlist shuffling, for reproducible runs
    pub seed: Option<u64>,
}

impl PlayerConfig {
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = Some(minutes);
        self
    }

    /// Configured offset, if it is a valid one
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes.checked_mul(60)?))
    }
}

/// Configuration for the player coordinator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub sync: SyncConfig,
    pub swap: SwapConfig,
    pub player: PlayerConfig,
}

impl CoordinatorConfig {
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_swap(mut self, swap: SwapConfig) -> Self {
        self.swap = swap;
        self
    }

    pub fn with_player(mut self, player: PlayerConfig) -> Self {
        self.player = player;
        self
    }
}
