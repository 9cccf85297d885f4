//! Selection strategy trait and core types
//!
//! Provides the [`SelectionStrategy`] trait used to pick a subset of
//! selectable units (blocks) out of a content source.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A selectable unit identified by an opaque balancing key
///
/// For survey blocks the key is the block's item-type.
pub trait Balanced {
    /// Key used for balancing and allocation matching
    fn balance_key(&self) -> &str;
}

impl Balanced for String {
    fn balance_key(&self) -> &str {
        self
    }
}

impl Balanced for &str {
    fn balance_key(&self) -> &str {
        self
    }
}

/// Engine-facing view of a persisted allocation
///
/// Carries only what the selection path needs: the stratum the allocation
/// was computed for and the item-types it names, in allocation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAllocation {
    /// Stratum the allocation belongs to
    pub stratum: String,
    /// Allocated item-types, in order
    pub item_types: Vec<String>,
}

impl BlockAllocation {
    /// Create new allocation view
    #[inline]
    #[must_use]
    pub fn new(stratum: impl Into<String>, item_types: Vec<String>) -> Self {
        Self {
            stratum: stratum.into(),
            item_types,
        }
    }

    /// Check whether the allocation names an item-type
    #[inline]
    #[must_use]
    pub fn names(&self, item_type: &str) -> bool {
        self.item_types.iter().any(|t| t == item_type)
    }

    /// Check if allocation names nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_types.is_empty()
    }
}

/// Inputs shared by all selection strategies
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext<'a> {
    /// Maximum number of units to select (`None` = all)
    pub count: Option<usize>,

    /// Participant stratum, if the section declares a stratum field
    pub stratum: Option<&'a str>,

    /// Pre-computed allocation supplied by the host
    pub allocation: Option<&'a BlockAllocation>,
}

impl<'a> SelectionContext<'a> {
    /// Create context with a count limit
    #[inline]
    #[must_use]
    pub fn with_count(count: Option<usize>) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Set participant stratum
    #[inline]
    #[must_use]
    pub fn stratum(mut self, stratum: Option<&'a str>) -> Self {
        self.stratum = stratum;
        self
    }

    /// Set allocation
    #[inline]
    #[must_use]
    pub fn allocation(mut self, allocation: Option<&'a BlockAllocation>) -> Self {
        self.allocation = allocation;
        self
    }
}

/// Where a selection's order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Uniform random pick; order carries no meaning
    Random,

    /// Filtered by an allocation; order is the allocation's order
    Allocation,
}

/// Result of a selection
#[derive(Debug, Clone)]
pub struct Selection<'a, T> {
    /// Chosen units, in selection order
    pub chosen: Vec<&'a T>,

    /// How the units were chosen
    pub source: SelectionSource,
}

impl<'a, T> Selection<'a, T> {
    /// Create selection
    #[inline]
    #[must_use]
    pub fn new(chosen: Vec<&'a T>, source: SelectionSource) -> Self {
        Self { chosen, source }
    }

    /// Whether the order is fixed by an allocation
    #[inline]
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        matches!(self.source, SelectionSource::Allocation)
    }

    /// Number of chosen units
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    /// Check if nothing was chosen
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// Selection strategy for picking units out of a source
///
/// Strategies are stateless; all randomness comes from the injected `rng`.
/// Like other type-parameterized strategies they are used directly, not as
/// trait objects.
pub trait SelectionStrategy: Send + Sync + std::fmt::Debug {
    /// Select units from `items`
    fn select<'a, T: Balanced, R: Rng + ?Sized>(
        &self,
        items: &'a [T],
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Selection<'a, T>;

    /// Strategy name (matches the definition vocabulary)
    fn name(&self) -> &'static str;
}

/// Selection strategy vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Uniform random subset
    Random,

    /// Allocation-driven subset with random fallback
    Stratified,
}

impl SelectionKind {
    /// Name as used in study definitions
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Stratified => "stratified",
        }
    }

    /// Dispatch to the concrete strategy
    pub fn select<'a, T: Balanced, R: Rng + ?Sized>(
        &self,
        items: &'a [T],
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Selection<'a, T> {
        match self {
            Self::Random => crate::RandomSelection::new().select(items, ctx, rng),
            Self::Stratified => crate::StratifiedSelection::new().select(items, ctx, rng),
        }
    }
}

impl std::fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
