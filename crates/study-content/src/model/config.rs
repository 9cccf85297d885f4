//! Study configuration
//!
//! A nested key-value document with three recognised option groups
//! (`routing`, `ui`, `quiz`). The raw document is kept for dotted-path
//! lookups by section conditionals. Read-only during a build.

use crate::error::ContentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use study_strategy::RandomizationPlan;

/// Typed view plus raw document
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    root: Value,

    /// Block counts and randomization toggles
    pub routing: RoutingOptions,

    /// Presentation options
    pub ui: UiOptions,

    /// Quiz/feedback options
    pub quiz: QuizOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
            routing: RoutingOptions::default(),
            ui: UiOptions::default(),
            quiz: QuizOptions::default(),
        }
    }
}

impl Configuration {
    /// Build from a JSON document
    ///
    /// # Errors
    /// `ContentError::Invalid` if the root is not an object or an option
    /// group has the wrong shape
    pub fn from_value(root: Value) -> Result<Self, ContentError> {
        if !root.is_object() {
            return Err(ContentError::invalid("configuration", "root must be an object"));
        }

        Ok(Self {
            routing: group(&root, "routing")?,
            ui: group(&root, "ui")?,
            quiz: group(&root, "quiz")?,
            root,
        })
    }

    /// Raw configuration document
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.root
    }

    /// Get value at path (dot notation)
    ///
    /// Numeric segments index into arrays.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let mut current = &self.root;
        for segment in path.split('.') {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                Value::Array(items) => current = items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

impl TryFrom<Value> for Configuration {
    type Error = ContentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn group<T: serde::de::DeserializeOwned + Default>(
    root: &Value,
    key: &str,
) -> Result<T, ContentError> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| ContentError::invalid(format!("configuration.{key}"), e)),
    }
}

/// `routing` option group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingOptions {
    /// Blocks per block-group when a section declares no count
    pub block_count: Option<usize>,

    /// Default for block-order shuffling
    pub randomize_blocks: bool,

    /// Default for within-block shuffling
    pub randomize_within_block: bool,

    /// Default for flat question shuffling
    pub randomize_questions: bool,
}

impl RoutingOptions {
    /// Randomization applied to sections without their own rule
    #[must_use]
    pub fn default_randomization(&self) -> RandomizationPlan {
        RandomizationPlan {
            blocks: self.randomize_blocks,
            within_block: self.randomize_within_block,
            questions: self.randomize_questions,
        }
    }
}

/// `ui` option group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiOptions {
    /// One page per question instead of one page per block
    #[serde(alias = "oneQuestionPerPage")]
    pub one_question_per_page: bool,

    /// Advance automatically once a page is answered
    #[serde(alias = "autoAdvance")]
    pub auto_advance: bool,

    /// Show the progress bar
    #[serde(alias = "showProgressBar")]
    pub show_progress_bar: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            one_question_per_page: true,
            auto_advance: false,
            show_progress_bar: true,
        }
    }
}

/// When quiz feedback is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackMode {
    /// Never
    #[serde(alias = "none")]
    Off,
    /// After each question
    Immediate,
    /// On the completion page
    #[default]
    End,
}

/// `quiz` option group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizOptions {
    /// Feedback timing
    pub feedback_mode: FeedbackMode,

    /// Include item explanations in feedback
    pub show_explanations: bool,
}
