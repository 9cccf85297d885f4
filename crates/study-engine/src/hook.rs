//! After-block hook
//!
//! Capability invoked by the section builder after each block's pages when
//! a section sets `afterBlock`. Returned pages are inserted right after the
//! block and re-prefixed with `"{section}/{item_type}/"`.

use crate::types::{Page, PageElement, ParticipantData};
use std::collections::BTreeSet;
use study_content::{Block, Item, ItemKind};

/// What the hook sees about the block just emitted
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    /// Section id
    pub section_id: &'a str,

    /// Block just emitted
    pub block: &'a Block,

    /// Zero-based position of the block within the section
    pub position: usize,

    /// Participant attributes
    pub participant: &'a ParticipantData,

    /// Participant stratum, if the section is stratified
    pub stratum: Option<&'a str>,
}

/// Produces extra pages after a block
pub trait AfterBlockHook: Send + Sync + std::fmt::Debug {
    /// Pages to insert after the block (names are re-prefixed by the caller)
    fn after_block(&self, ctx: &BlockContext<'_>) -> Vec<Page>;
}

/// Appends one confidence-rating page per block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidenceRatingHook {
    strata: Option<BTreeSet<String>>,
    min: i64,
    max: i64,
}

impl Default for ConfidenceRatingHook {
    fn default() -> Self {
        Self {
            strata: None,
            min: 1,
            max: 5,
        }
    }
}

impl ConfidenceRatingHook {
    /// Rating page after every block, 1..=5 scale
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only emit for participants in these strata
    #[must_use]
    pub fn for_strata<I, S>(mut self, strata: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strata = Some(strata.into_iter().map(Into::into).collect());
        self
    }

    /// Rating scale bounds
    #[must_use]
    pub fn with_scale(mut self, min: i64, max: i64) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

impl AfterBlockHook for ConfidenceRatingHook {
    fn after_block(&self, ctx: &BlockContext<'_>) -> Vec<Page> {
        if let Some(strata) = &self.strata {
            if !ctx.stratum.is_some_and(|s| strata.contains(s)) {
                return Vec::new();
            }
        }

        let item_type = &ctx.block.item_type;
        let label = if ctx.block.label.is_empty() {
            item_type.as_str()
        } else {
            ctx.block.label.as_str()
        };
        let rating = Item::new(
            format!("{item_type}_confidence"),
            ItemKind::Rating {
                min: self.min,
                max: self.max,
            },
        )
        .with_stem(format!("How confident are you in your answers about {label}?"));

        vec![Page::new("confidence", vec![PageElement::Question(rating)])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(block: &'a Block, participant: &'a ParticipantData, stratum: Option<&'a str>) -> BlockContext<'a> {
        BlockContext {
            section_id: "testlets",
            block,
            position: 0,
            participant,
            stratum,
        }
    }

    #[test]
    fn confidence_page_per_block() {
        let block = Block::new("storm", "Storm slab", vec![]);
        let participant = ParticipantData::new();
        let pages = ConfidenceRatingHook::new().after_block(&ctx(&block, &participant, None));

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].name, "confidence");
        assert_eq!(pages[0].question_ids().collect::<Vec<_>>(), vec!["storm_confidence"]);
    }

    #[test]
    fn confidence_restricted_to_strata() {
        let block = Block::new("wind", "", vec![]);
        let participant = ParticipantData::new();
        let hook = ConfidenceRatingHook::new().for_strata(["novice"]);

        assert!(hook.after_block(&ctx(&block, &participant, Some("advanced"))).is_empty());
        assert!(hook.after_block(&ctx(&block, &participant, None)).is_empty());
        assert_eq!(hook.after_block(&ctx(&block, &participant, Some("novice"))).len(), 1);
    }
}
