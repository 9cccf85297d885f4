//! Study Engine
//!
//! Interprets a declarative study definition, a content bank and a
//! configuration into the ordered page list shown to one participant.
//!
//! - Walks sections in order and evaluates their conditionals
//! - Selects and orders blocks through the strategy registry
//! - Consumes a pre-computed allocation without computing balance itself
//! - Invokes an injected [`AfterBlockHook`] after each block when asked
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use study_content::{Block, Configuration, ContentBank, ContentSource, Item, ItemKind, Section, SectionKind, StudyDefinition};
//! use study_engine::{ParticipantData, StudyEngine};
//!
//! let bank = ContentBank::new()
//!     .with_source("testlets", ContentSource::Blocks(vec![
//!         Block::new("storm", "Storm slab", vec![Item::new("s1", ItemKind::Text)]),
//!     ]))
//!     .unwrap();
//! let definition = StudyDefinition::new("demo", vec![
//!     Section::new("testlets", SectionKind::BlockGroup, "testlets"),
//! ]);
//! let config = Configuration::default();
//!
//! let engine = StudyEngine::new(&definition, &bank, &config);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let survey = engine.build(&ParticipantData::new(), None, &mut rng).unwrap();
//! assert_eq!(survey.page_names().collect::<Vec<_>>(), vec!["testlets/storm/s1"]);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod builder;
pub mod engine;
pub mod error;
pub mod hook;
pub mod types;

// Re-exports for convenience
pub use builder::{BuildInputs, SectionBuilder, SectionOutput};
pub use engine::{build_survey, StudyEngine};
pub use error::{BuildError, ConfigError, DefinitionError};
pub use hook::{AfterBlockHook, BlockContext, ConfidenceRatingHook};
pub use types::{
    BuildPolicy, BuildWarning, Page, PageElement, ParticipantData, SelectedBlocks, Survey,
    SurveySettings,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the study engine
    pub use crate::{
        build_survey, AfterBlockHook, BuildError, BuildPolicy, Page, ParticipantData,
        StudyEngine, Survey,
    };
    pub use study_strategy::BlockAllocation;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
