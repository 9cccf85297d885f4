//! Study definition: the ordered, declarative section list

use crate::error::ContentError;
use crate::model::config::Configuration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use study_strategy::RandomizationPlan;

/// Ordered sequence of sections making up one study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyDefinition {
    /// Study identifier (namespaces allocations and responses)
    pub study_id: String,

    /// Optional definition version, echoed into submissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Sections in presentation order
    pub sections: Vec<Section>,
}

impl StudyDefinition {
    /// Create definition from sections
    #[must_use]
    pub fn new(study_id: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            study_id: study_id.into(),
            version: None,
            sections,
        }
    }

    /// Look up a section by id
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Check that section identifiers are unique
    ///
    /// # Errors
    /// `ContentError::DuplicateSection` naming the first repeated id
    pub fn check_unique_ids(&self) -> Result<(), ContentError> {
        let mut seen = HashSet::with_capacity(self.sections.len());
        for section in &self.sections {
            if !seen.insert(section.id.as_str()) {
                return Err(ContentError::DuplicateSection(section.id.clone()));
            }
        }
        Ok(())
    }
}

/// Section type vocabulary
///
/// Unrecognised tags deserialize to [`SectionKind::Unknown`] so that newer
/// definitions still load; such sections produce no pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Pre-structured welcome/consent pages
    Intro,
    /// Background questionnaire pages
    Background,
    /// Group of selectable blocks (testlets)
    BlockGroup,
    /// Stand-alone questions or page set
    Standalone,
    /// Completion feedback, rendered by an external flow
    Feedback,
    /// Forward-compatible catch-all
    #[serde(other)]
    Unknown,
}

impl SectionKind {
    /// Tag as written in definitions
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Background => "background",
            Self::BlockGroup => "block_group",
            Self::Standalone => "standalone",
            Self::Feedback => "feedback",
            Self::Unknown => "unknown",
        }
    }
}

/// One declaratively-defined unit of survey structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Identifier, unique within the definition
    pub id: String,

    /// Section type
    #[serde(rename = "type")]
    pub kind: SectionKind,

    /// Name of the content source in the bank
    pub source: String,

    /// Optional display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Block selection rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionSpec>,

    /// Ordering rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomization: Option<RandomizationPlan>,

    /// Invoke the after-block hook after each block's pages
    #[serde(default, rename = "afterBlock", alias = "after_block")]
    pub after_block: bool,

    /// Inclusion predicate over the configuration
    #[serde(default, alias = "condition", skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Condition>,
}

impl Section {
    /// Create a bare section
    #[must_use]
    pub fn new(id: impl Into<String>, kind: SectionKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            title: None,
            selection: None,
            randomization: None,
            after_block: false,
            conditional: None,
        }
    }

    /// With selection rule
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionSpec) -> Self {
        self.selection = Some(selection);
        self
    }

    /// With randomization rule
    #[must_use]
    pub fn with_randomization(mut self, plan: RandomizationPlan) -> Self {
        self.randomization = Some(plan);
        self
    }

    /// With inclusion predicate
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditional = Some(condition);
        self
    }

    /// Enable the after-block hook
    #[must_use]
    pub fn with_after_block(mut self) -> Self {
        self.after_block = true;
        self
    }
}

/// `{strategy, stratum_field, count}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSpec {
    /// Strategy name, resolved through the strategy registry
    pub strategy: String,

    /// Participant-data field holding the stratum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratum_field: Option<String>,

    /// Number of blocks to select
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl SelectionSpec {
    /// Random selection of `count` blocks
    #[must_use]
    pub fn random(count: Option<usize>) -> Self {
        Self {
            strategy: "random".to_string(),
            stratum_field: None,
            count,
        }
    }

    /// Stratified selection keyed by `stratum_field`
    #[must_use]
    pub fn stratified(stratum_field: impl Into<String>, count: Option<usize>) -> Self {
        Self {
            strategy: "stratified".to_string(),
            stratum_field: Some(stratum_field.into()),
            count,
        }
    }
}

/// `{field, value}` predicate over the configuration
///
/// `field` is a dotted path. `default` decides the outcome when the path
/// does not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted configuration path
    pub field: String,

    /// Required value (exact equality)
    #[serde(alias = "equals")]
    pub value: Value,

    /// Outcome when `field` does not resolve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

impl Condition {
    /// Create predicate without a default
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            default: None,
        }
    }

    /// Set unresolved-path outcome
    #[must_use]
    pub fn or_default(mut self, default: bool) -> Self {
        self.default = Some(default);
        self
    }

    /// Evaluate against a configuration
    ///
    /// # Returns
    /// - `Some(true|false)` when the path resolves (or a default applies)
    /// - `None` when the path is unresolved and no default is declared
    #[must_use]
    pub fn evaluate(&self, config: &Configuration) -> Option<bool> {
        match config.get_path(&self.field) {
            Some(actual) => Some(*actual == self.value),
            None => self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_deserializes_full() {
        let section: Section = serde_json::from_value(json!({
            "id": "testlets",
            "type": "block_group",
            "source": "testlets",
            "selection": {"strategy": "stratified", "stratum_field": "experience_band", "count": 2},
            "randomization": {"blocks": true},
            "afterBlock": true,
            "conditional": {"field": "routing.include_testlets", "value": true}
        }))
        .unwrap();

        assert_eq!(section.kind, SectionKind::BlockGroup);
        assert!(section.after_block);
        assert_eq!(section.selection.as_ref().unwrap().count, Some(2));
        assert!(section.randomization.unwrap().blocks);
        assert_eq!(section.conditional.unwrap().value, json!(true));
    }

    #[test]
    fn unknown_section_type_tolerated() {
        let section: Section = serde_json::from_value(json!({
            "id": "x", "type": "video_wall", "source": "clips"
        }))
        .unwrap();
        assert_eq!(section.kind, SectionKind::Unknown);
    }

    #[test]
    fn duplicate_section_ids_rejected() {
        let def = StudyDefinition::new(
            "s",
            vec![
                Section::new("a", SectionKind::Intro, "intro"),
                Section::new("a", SectionKind::Feedback, "feedback"),
            ],
        );
        assert!(matches!(
            def.check_unique_ids(),
            Err(ContentError::DuplicateSection(id)) if id == "a"
        ));
    }

    #[test]
    fn condition_evaluate() {
        let config = Configuration::from_value(json!({"routing": {"mode": "full"}})).unwrap();

        assert_eq!(Condition::equals("routing.mode", "full").evaluate(&config), Some(true));
        assert_eq!(Condition::equals("routing.mode", "short").evaluate(&config), Some(false));
        assert_eq!(Condition::equals("routing.missing", true).evaluate(&config), None);
        assert_eq!(
            Condition::equals("routing.missing", true).or_default(true).evaluate(&config),
            Some(true)
        );
    }

    #[test]
    fn condition_type_sensitive_equality() {
        let config = Configuration::from_value(json!({"quiz": {"level": 2}})).unwrap();
        assert_eq!(Condition::equals("quiz.level", "2").evaluate(&config), Some(false));
        assert_eq!(Condition::equals("quiz.level", 2).evaluate(&config), Some(true));
    }
}
