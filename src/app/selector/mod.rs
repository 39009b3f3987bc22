//! Playlist selection for display areas
//!
//! Each display area owns a [`PlaylistSelector`] that decides which content
//! item to show next. Items are split into three pools by play type and
//! consulted in a fixed order:
//!
//! 1. **fixed**: activated, out of its recency delay, and inside its time,
//!    date and geo targeting
//! 2. **floating**: the same checks without the recency delay
//! 3. **free**: activated and inside its time and geo targeting
//!
//! Every pool is reshuffled on every call so consecutive picks are not
//! correlated. The selector is synchronous: it only reads in-memory state
//! and the clock held by the shared [`PlaybackContext`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_fetcher::app::{PlaybackContext, PlaylistSelector};
//!
//! # fn example(items: &[signage_fetcher::app::manifest::ContentItem]) {
//! let context = Arc::new(PlaybackContext::with_system_clock());
//! let mut selector = PlaylistSelector::new("main", context);
//! selector.update_items(items);
//!
//! match selector.next() {
//!     Some(id) => println!("play {}", id),
//!     None => println!("no content"),
//! }
//! # }
//! ```

pub mod areas;
pub mod pools;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::app::manifest::{ContentItem, GeoPoint};
use crate::app::state::PlaybackContext;

pub use areas::AreaPlaylists;
pub use pools::Pools;

/// Which checks a pool applies to its candidates
#[derive(Debug, Clone, Copy)]
struct PoolRules {
    recency: bool,
    date_range: bool,
}

const FIXED_RULES: PoolRules = PoolRules {
    recency: true,
    date_range: true,
};
const FLOATING_RULES: PoolRules = PoolRules {
    recency: false,
    date_range: true,
};
const FREE_RULES: PoolRules = PoolRules {
    recency: false,
    date_range: false,
};

/// Time and location a selection is evaluated against
struct Moment {
    now: DateTime<Utc>,
    local: NaiveDateTime,
    location: Option<GeoPoint>,
}

/// Fairness-aware "next item" chooser for one display area
pub struct PlaylistSelector {
    area_id: String,
    pools: Option<Pools>,
    last_shown: HashMap<String, DateTime<Utc>>,
    context: Arc<PlaybackContext>,
    rng: StdRng,
}

impl PlaylistSelector {
    /// Create an idle selector; it returns nothing until items are loaded
    pub fn new(area_id: impl Into<String>, context: Arc<PlaybackContext>) -> Self {
        Self {
            area_id: area_id.into(),
            pools: None,
            last_shown: HashMap::new(),
            context,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a deterministic shuffle sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn area_id(&self) -> &str {
        &self.area_id
    }

    /// Rebuild the pools from a new content list
    ///
    /// Recency timestamps are kept for ids that are still present and
    /// dropped for ids that disappeared.
    pub fn update_items(&mut self, items: &[ContentItem]) {
        let pools = Pools::classify(items);
        self.last_shown.retain(|id, _| pools.contains(id));

        debug!(
            "Area {}: {} fixed, {} floating, {} free",
            self.area_id,
            pools.fixed.len(),
            pools.floating.len(),
            pools.free.len()
        );
        self.pools = Some(pools);
    }

    /// Drop all content and return to the idle state
    pub fn clear(&mut self) {
        self.pools = None;
        self.last_shown.clear();
    }

    /// Whether a manifest has been loaded
    pub fn is_ready(&self) -> bool {
        self.pools.is_some()
    }

    /// Choose the next item to play
    ///
    /// Returns `None` when no pool has an eligible candidate; callers should
    /// treat that as "nothing to show" and ask again later.
    pub fn next(&mut self) -> Option<String> {
        let moment = Moment {
            now: self.context.now_utc(),
            local: self.context.now_local(),
            location: self.context.location(),
        };

        let pools = self.pools.as_mut()?;
        pools.shuffle(&mut self.rng);

        let context = &self.context;
        let last_shown = &self.last_shown;
        let passes = |item: &ContentItem, rules: PoolRules| {
            Self::is_eligible(context, last_shown, item, rules, &moment)
        };

        let chosen = pools
            .fixed
            .iter()
            .find(|item| passes(*item, FIXED_RULES))
            .or_else(|| pools.floating.iter().find(|item| passes(*item, FLOATING_RULES)))
            .or_else(|| pools.free.iter().find(|item| passes(*item, FREE_RULES)))
            .map(|item| (item.id.clone(), item.delay));

        let Some((id, delay)) = chosen else {
            trace!("Area {}: no eligible content", self.area_id);
            return None;
        };

        // Delays past the representable range pin the item until the end of time
        let eligible_again = ChronoDuration::from_std(delay)
            .ok()
            .and_then(|delay| moment.now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = self.last_shown.entry(id.clone()).or_insert(eligible_again);
        if *entry < eligible_again {
            *entry = eligible_again;
        }

        debug!("Area {}: selected {}", self.area_id, id);
        Some(id)
    }

    /// Whether any pool holds at least one activated item
    pub fn have_next(&self) -> bool {
        self.pools.as_ref().is_some_and(|pools| {
            pools
                .iter()
                .any(|item| self.context.is_activated(&item.id))
        })
    }

    /// Full metadata for an item of this area
    pub fn find_item_by_id(&self, content_id: &str) -> Option<&ContentItem> {
        self.pools
            .as_ref()?
            .iter()
            .find(|item| item.id == content_id)
    }

    /// Instant after which the item may be picked from the fixed pool again
    pub fn eligible_after(&self, content_id: &str) -> Option<DateTime<Utc>> {
        self.last_shown.get(content_id).copied()
    }

    pub fn item_count(&self) -> usize {
        self.pools.as_ref().map_or(0, Pools::len)
    }

    fn is_eligible(
        context: &PlaybackContext,
        last_shown: &HashMap<String, DateTime<Utc>>,
        item: &ContentItem,
        rules: PoolRules,
        moment: &Moment,
    ) -> bool {
        if !context.is_activated(&item.id) {
            return false;
        }
        if rules.recency {
            if let Some(until) = last_shown.get(&item.id) {
                if moment.now <= *until {
                    return false;
                }
            }
        }
        if !item.time_targeting.allows(moment.local) {
            return false;
        }
        if rules.date_range && !item.date_range.contains(moment.local) {
            return false;
        }
        item.geo_fence.allows(moment.location)
    }
}

impl std::fmt::Debug for PlaylistSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistSelector")
            .field("area_id", &self.area_id)
            .field("items", &self.item_count())
            .field("tracked", &self.last_shown.len())
            .finish()
    }
}
