//! Allocation-driven selection
//!
//! The stratified strategy never computes balance itself. It only consumes
//! a pre-computed [`BlockAllocation`]; balance logic stays out of the
//! rendering path.

use crate::random::RandomSelection;
use crate::strategy::{
    Balanced, BlockAllocation, Selection, SelectionContext, SelectionSource, SelectionStrategy,
};
use rand::Rng;

/// Stratified selection: use the allocation when present, else random
#[derive(Debug, Clone, Copy, Default)]
pub struct StratifiedSelection;

impl StratifiedSelection {
    /// Create new stratified selection strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Filter `items` to the allocation's item-types, in allocation order
    ///
    /// Allocated names with no matching unit are skipped.
    fn filter_by_allocation<'a, T: Balanced>(
        items: &'a [T],
        allocation: &BlockAllocation,
    ) -> Vec<&'a T> {
        allocation
            .item_types
            .iter()
            .filter_map(|wanted| {
                let found = items.iter().find(|item| item.balance_key() == wanted);
                if found.is_none() {
                    tracing::warn!(item_type = %wanted, "allocated item-type not present in source");
                }
                found
            })
            .collect()
    }

    fn usable_allocation<'c>(ctx: &SelectionContext<'c>) -> Option<&'c BlockAllocation> {
        let allocation = ctx.allocation.filter(|a| !a.is_empty())?;
        match ctx.stratum {
            Some(stratum) if stratum != allocation.stratum => {
                tracing::warn!(
                    participant_stratum = %stratum,
                    allocation_stratum = %allocation.stratum,
                    "allocation stratum mismatch, ignoring allocation"
                );
                None
            }
            _ => Some(allocation),
        }
    }
}

impl SelectionStrategy for StratifiedSelection {
    fn select<'a, T: Balanced, R: Rng + ?Sized>(
        &self,
        items: &'a [T],
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Selection<'a, T> {
        if let Some(allocation) = Self::usable_allocation(ctx) {
            let chosen = Self::filter_by_allocation(items, allocation);
            if !chosen.is_empty() {
                tracing::debug!(
                    stratum = %allocation.stratum,
                    selected = chosen.len(),
                    "selection fixed by allocation"
                );
                return Selection::new(chosen, SelectionSource::Allocation);
            }
        }

        tracing::debug!("no usable allocation, falling back to random selection");
        RandomSelection::new().select(items, ctx, rng)
    }

    fn name(&self) -> &'static str {
        "stratified"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn items() -> Vec<String> {
        ["storm", "wind", "persistent", "cornice"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    fn keys<T: Balanced>(sel: &Selection<'_, T>) -> Vec<String> {
        sel.chosen.iter().map(|t| t.balance_key().to_string()).collect()
    }

    #[test]
    fn stratified_uses_allocation_order() {
        let items = items();
        let alloc = BlockAllocation::new("novice", vec!["wind".into(), "cornice".into()]);
        let ctx = SelectionContext::with_count(Some(2))
            .stratum(Some("novice"))
            .allocation(Some(&alloc));
        let mut rng = StdRng::seed_from_u64(9);

        let sel = StratifiedSelection::new().select(&items, &ctx, &mut rng);
        assert!(sel.is_allocated());
        assert_eq!(keys(&sel), vec!["wind", "cornice"]);
    }

    #[test]
    fn stratified_allocation_order_independent_of_items() {
        let forward = items();
        let mut reversed = items();
        reversed.reverse();
        let alloc = BlockAllocation::new("novice", vec!["persistent".into(), "storm".into()]);
        let ctx = SelectionContext::default().allocation(Some(&alloc));
        let mut rng = StdRng::seed_from_u64(10);

        let a = StratifiedSelection::new().select(&forward, &ctx, &mut rng);
        let b = StratifiedSelection::new().select(&reversed, &ctx, &mut rng);
        assert_eq!(keys(&a), keys(&b));
    }

    #[test]
    fn stratified_without_allocation_is_random() {
        let items = items();
        let mut rng = StdRng::seed_from_u64(11);
        let ctx = SelectionContext::with_count(Some(2)).stratum(Some("novice"));

        let sel = StratifiedSelection::new().select(&items, &ctx, &mut rng);
        assert!(!sel.is_allocated());
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn stratified_skips_unknown_allocated_names() {
        let items = items();
        let alloc = BlockAllocation::new("novice", vec!["storm".into(), "glide".into()]);
        let ctx = SelectionContext::default().allocation(Some(&alloc));
        let mut rng = StdRng::seed_from_u64(12);

        let sel = StratifiedSelection::new().select(&items, &ctx, &mut rng);
        assert_eq!(keys(&sel), vec!["storm"]);
    }

    #[test]
    fn stratified_falls_back_when_nothing_matches() {
        let items = items();
        let alloc = BlockAllocation::new("novice", vec!["glide".into()]);
        let ctx = SelectionContext::with_count(Some(2)).allocation(Some(&alloc));
        let mut rng = StdRng::seed_from_u64(13);

        let sel = StratifiedSelection::new().select(&items, &ctx, &mut rng);
        assert!(!sel.is_allocated());
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn stratified_ignores_allocation_for_other_stratum() {
        let items = items();
        let alloc = BlockAllocation::new("advanced", vec!["storm".into(), "wind".into()]);
        let ctx = SelectionContext::with_count(Some(3))
            .stratum(Some("novice"))
            .allocation(Some(&alloc));
        let mut rng = StdRng::seed_from_u64(14);

        let sel = StratifiedSelection::new().select(&items, &ctx, &mut rng);
        assert!(!sel.is_allocated());
        assert_eq!(sel.len(), 3);
    }
}
