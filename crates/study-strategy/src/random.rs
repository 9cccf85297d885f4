//! Uniform random selection

use crate::strategy::{Balanced, Selection, SelectionContext, SelectionSource, SelectionStrategy};
use rand::seq::SliceRandom;
use rand::Rng;

/// Random selection: shuffle, then truncate to `count`
///
/// Returns all units when `count` is absent or not smaller than the
/// number of units.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelection;

impl RandomSelection {
    /// Create new random selection strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for RandomSelection {
    fn select<'a, T: Balanced, R: Rng + ?Sized>(
        &self,
        items: &'a [T],
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Selection<'a, T> {
        let mut chosen: Vec<&'a T> = items.iter().collect();
        chosen.shuffle(rng);
        if let Some(count) = ctx.count {
            chosen.truncate(count);
        }
        Selection::new(chosen, SelectionSource::Random)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
