//! Study Strategy Library
//!
//! Selection and randomization strategies for survey blocks.
//!
//! # Core Concepts
//!
//! - [`SelectionStrategy`]: Core trait for picking a subset of blocks
//! - [`RandomSelection`]: Uniform shuffle then truncate
//! - [`StratifiedSelection`]: Consume a pre-computed [`BlockAllocation`]
//! - [`RandomizationPlan`]: Block, within-block and question shuffles
//! - [`StrategyRegistry`]: Resolve definition vocabulary to strategies
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use study_strategy::{BlockAllocation, SelectionContext, StrategyRegistry};
//!
//! let registry = StrategyRegistry::with_defaults();
//! let kind = registry.resolve("stratified").unwrap();
//!
//! let blocks = vec!["storm".to_string(), "wind".to_string(), "cornice".to_string()];
//! let allocation = BlockAllocation::new("novice", vec!["cornice".into(), "storm".into()]);
//! let ctx = SelectionContext::with_count(Some(2)).allocation(Some(&allocation));
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let selection = kind.select(&blocks, &ctx, &mut rng);
//! assert_eq!(selection.chosen, vec![&blocks[2], &blocks[0]]);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod random;
mod registry;
mod shuffle;
mod stratified;
mod strategy;

// Re-exports
pub use random::RandomSelection;
pub use registry::StrategyRegistry;
pub use shuffle::{shuffle, shuffled, RandomizationPlan};
pub use stratified::StratifiedSelection;
pub use strategy::{
    Balanced, BlockAllocation, Selection, SelectionContext, SelectionKind, SelectionSource,
    SelectionStrategy,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
