//! Randomization strategies
//!
//! Pure, stateless uniform permutations. Each call draws only from the
//! generator it is handed, so tests can inject a seeded `StdRng`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Shuffle a slice in place (Fisher–Yates)
#[inline]
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Return a shuffled copy of `items`
#[must_use]
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    out.shuffle(rng);
    out
}

/// Which orderings of a section are randomized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizationPlan {
    /// Shuffle block order
    pub blocks: bool,

    /// Shuffle item order inside each block
    pub within_block: bool,

    /// Shuffle a flat question list
    pub questions: bool,
}

impl RandomizationPlan {
    /// Plan with nothing randomized
    #[inline]
    #[must_use]
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Apply block-order shuffle if enabled
    pub fn order_blocks<T, R: Rng + ?Sized>(&self, blocks: &mut [T], rng: &mut R) {
        if self.blocks {
            shuffle(blocks, rng);
        }
    }

    /// Apply within-block shuffle if enabled
    pub fn order_block_items<T, R: Rng + ?Sized>(&self, items: &mut [T], rng: &mut R) {
        if self.within_block {
            shuffle(items, rng);
        }
    }

    /// Apply flat question shuffle if enabled
    pub fn order_questions<T, R: Rng + ?Sized>(&self, items: &mut [T], rng: &mut R) {
        if self.questions {
            shuffle(items, rng);
        }
    }
}
