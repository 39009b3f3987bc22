//! Pool classification for a single display area

use rand::seq::SliceRandom;
use rand::Rng;

use crate::app::manifest::{ContentItem, PlayType};

/// Candidate pools, in the order they are consulted
#[derive(Debug, Clone, Default)]
pub struct Pools {
    /// Play type "fixed" plus unlabeled items; subject to the recency delay
    pub fixed: Vec<ContentItem>,
    /// Play type "none"
    pub floating: Vec<ContentItem>,
    /// Play type "free"; filler
    pub free: Vec<ContentItem>,
}

impl Pools {
    /// Split an area's content list by play type
    ///
    /// Unlabeled items join the fixed pool only, so every item sits in
    /// exactly one pool.
    pub fn classify<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a ContentItem>,
    {
        let mut pools = Pools::default();
        for item in items {
            let pool = match item.play_type {
                PlayType::Fixed | PlayType::Unlabeled => &mut pools.fixed,
                PlayType::None => &mut pools.floating,
                PlayType::Free => &mut pools.free,
            };
            pool.push(item.clone());
        }
        pools
    }

    /// Independently reorder every pool with a uniform permutation
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.fixed.shuffle(rng);
        self.floating.shuffle(rng);
        self.free.shuffle(rng);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> {
        self.fixed
            .iter()
            .chain(self.floating.iter())
            .chain(self.free.iter())
    }

    pub fn len(&self) -> usize {
        self.fixed.len() + self.floating.len() + self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.iter().any(|item| item.id == content_id)
    }
}
