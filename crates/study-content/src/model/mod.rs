//! Typed study documents

mod bank;
mod config;
mod definition;

pub use bank::{BankDocument, Block, Choice, ContentBank, ContentSource, Item, ItemKind, PageSet, SourcePage};
pub use config::{Configuration, FeedbackMode, QuizOptions, RoutingOptions, UiOptions};
pub use definition::{Condition, Section, SectionKind, SelectionSpec, StudyDefinition};
