//! Study Content
//!
//! The boundary between files on disk and the typed study model.
//!
//! # Core Operations
//!
//! - **Ingress**: Parse JSON/YAML documents into `serde_json::Value`
//! - **Validate**: Check each document against its embedded JSON Schema
//! - **Interpret**: Deserialize into [`StudyDefinition`], [`ContentBank`], [`Configuration`]
//! - **Lint**: Logical bank checks ([`lint_bank`])
//!
//! # Architecture
//!
//! ```text
//! File System → ParserRegistry → Value → schema::validate → model types → StudyBundle
//! ```
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use study_content::{definition_from_value, SectionKind};
//!
//! let definition = definition_from_value(json!({
//!     "study_id": "avalanche_2025",
//!     "sections": [{"id": "intro", "type": "intro", "source": "ap_intro"}]
//! }))
//! .unwrap();
//! assert_eq!(definition.sections[0].kind, SectionKind::Intro);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod error;
pub mod lint;
pub mod loader;
pub mod model;
pub mod parsers;
pub mod schema;

// Re-exports for convenience
pub use error::{ContentError, ContentResult};
pub use lint::{lint_bank, LintIssue, LintReport, LintRules, Severity};
pub use loader::{
    bank_from_value, configuration_from_value, definition_from_value, load_bank,
    load_configuration, load_definition, load_document, load_page_set, page_set_from_value,
    StudyBundle,
};
pub use model::{
    BankDocument, Block, Choice, Condition, Configuration, ContentBank, ContentSource,
    FeedbackMode, Item, ItemKind, PageSet, QuizOptions, RoutingOptions, Section, SectionKind,
    SelectionSpec, SourcePage, StudyDefinition, UiOptions,
};
pub use schema::DocumentKind;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with study content
    pub use crate::error::ContentError;
    pub use crate::model::{
        Configuration, ContentBank, ContentSource, Item, ItemKind, Section, SectionKind,
        StudyDefinition,
    };
    pub use crate::StudyBundle;
    pub use study_strategy::RandomizationPlan;
}
