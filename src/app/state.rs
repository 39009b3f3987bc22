//! Shared playback context
//!
//! A single [`PlaybackContext`] is created per device and handed (as an `Arc`)
//! to the selectors, the synchronizer and the file swapper. It holds the
//! activation and priority registries, the id reported as currently playing
//! by the front end, and the device location used for geofencing.
//!
//! Locks are `parking_lot` locks and are never held across an `.await`, so the
//! synchronous selector can read the context without suspending.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::app::clock::{to_local, Clock, SystemClock};
use crate::app::manifest::GeoPoint;

/// Registry shared between selection, synchronization and swapping
pub struct PlaybackContext {
    activation: RwLock<HashMap<String, bool>>,
    priority: RwLock<HashSet<String>>,
    currently_playing: RwLock<Option<String>>,
    location: RwLock<Option<GeoPoint>>,
    utc_offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl PlaybackContext {
    /// Create a context with an explicit clock and UTC offset
    pub fn new(clock: Arc<dyn Clock>, utc_offset: FixedOffset) -> Self {
        Self {
            activation: RwLock::new(HashMap::new()),
            priority: RwLock::new(HashSet::new()),
            currently_playing: RwLock::new(None),
            location: RwLock::new(None),
            utc_offset,
            clock,
        }
    }

    /// Create a context on the system clock using the host's current offset
    pub fn with_system_clock() -> Self {
        let offset = Local::now().offset().fix();
        Self::new(Arc::new(SystemClock), offset)
    }

    /// Whether the item is fully downloaded and verified
    pub fn is_activated(&self, content_id: &str) -> bool {
        self.activation
            .read()
            .get(content_id)
            .copied()
            .unwrap_or(false)
    }

    /// Set the activation flag for an item
    pub fn set_activated(&self, content_id: &str, activated: bool) {
        let previous = self
            .activation
            .write()
            .insert(content_id.to_string(), activated);
        if previous != Some(activated) {
            debug!("Activation for {} set to {}", content_id, activated);
        }
    }

    /// Number of items currently flagged as playable
    pub fn activated_count(&self) -> usize {
        self.activation.read().values().filter(|v| **v).count()
    }

    /// Replace the high-priority id set
    pub fn set_priority_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut priority = self.priority.write();
        priority.clear();
        priority.extend(ids.into_iter().map(Into::into));
    }

    /// Whether the item was flagged as high priority by the manifest
    pub fn is_priority(&self, content_id: &str) -> bool {
        self.priority.read().contains(content_id)
    }

    /// Record the id the front end is playing right now
    pub fn set_currently_playing(&self, content_id: Option<&str>) {
        *self.currently_playing.write() = content_id.map(str::to_string);
    }

    /// Id reported as playing, if any
    pub fn currently_playing(&self) -> Option<String> {
        self.currently_playing.read().clone()
    }

    /// Whether `content_id` is the item reported as playing
    pub fn is_playing(&self, content_id: &str) -> bool {
        self.currently_playing.read().as_deref() == Some(content_id)
    }

    /// Update the device location; `None` disables geofence filtering
    pub fn set_location(&self, location: Option<GeoPoint>) {
        *self.location.write() = location;
    }

    pub fn location(&self) -> Option<GeoPoint> {
        *self.location.read()
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Current instant in UTC
    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Current device-local wall time
    pub fn now_local(&self) -> NaiveDateTime {
        to_local(self.clock.now_utc(), self.utc_offset)
    }
}

impl Default for PlaybackContext {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

impl std::fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("activated", &self.activated_count())
            .field("currently_playing", &self.currently_playing())
            .field("location", &self.location())
            .field("utc_offset", &self.utc_offset)
            .finish()
    }
}
