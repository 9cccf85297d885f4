//! Core types for survey construction
//!
//! Defines the engine's inputs and outputs:
//! - Participant data
//! - Pages and page elements
//! - The assembled survey with its settings and warnings
//! - Build policy

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use study_content::{Item, QuizOptions, UiOptions};

/// Free-form participant attributes (background answers, stratum)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantData(Map<String, Value>);

impl ParticipantData {
    /// Create empty participant data
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attribute
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set attribute
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get attribute
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String attribute, empty strings treated as absent
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}

impl From<Map<String, Value>> for ParticipantData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One element of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageElement {
    /// Question from the content bank
    Question(Item),
    /// Opaque element from a page set
    Raw(Value),
}

/// One screen of the survey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Name, unique within a survey
    pub name: String,

    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Elements in display order
    pub elements: Vec<PageElement>,
}

impl Page {
    /// Create page
    #[must_use]
    pub fn new(name: impl Into<String>, elements: Vec<PageElement>) -> Self {
        Self {
            name: name.into(),
            title: None,
            elements,
        }
    }

    /// With title
    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Question ids on this page, in order
    pub fn question_ids(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            PageElement::Question(item) => Some(item.id.as_str()),
            PageElement::Raw(_) => None,
        })
    }
}

/// Presentation settings passed through to the renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveySettings {
    /// UI options
    pub ui: UiOptions,

    /// Quiz options
    pub quiz: QuizOptions,
}

/// Non-fatal problem recorded during a lenient build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWarning {
    /// Section that was skipped
    pub section: String,

    /// Reason
    pub message: String,
}

/// Realized block selection for one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedBlocks {
    /// Section id
    pub section: String,

    /// Item-types in presentation order
    pub item_types: Vec<String>,

    /// Whether the selection came from an allocation
    pub allocated: bool,
}

/// Ordered page list for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    /// Study identifier
    pub study_id: String,

    /// Pages in order
    pub pages: Vec<Page>,

    /// Presentation settings
    pub settings: SurveySettings,

    /// Block selections per block-group section
    #[serde(default)]
    pub selected_blocks: Vec<SelectedBlocks>,

    /// Sections skipped because of definition or configuration errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<BuildWarning>,
}

impl Survey {
    /// Page names in order
    pub fn page_names(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|p| p.name.as_str())
    }

    /// Find page by name
    #[must_use]
    pub fn page(&self, name: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.name == name)
    }

    /// Item-types selected across all block-group sections
    pub fn item_types(&self) -> impl Iterator<Item = &str> {
        self.selected_blocks
            .iter()
            .flat_map(|s| s.item_types.iter().map(String::as_str))
    }
}

/// How section-level errors are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
    /// Skip the failing section and record a warning
    #[default]
    Lenient,
    /// Abort the build with the first error
    Strict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use study_content::ItemKind;

    #[test]
    fn participant_data_empty_string_absent() {
        let data = ParticipantData::new()
            .with("experience_band", "")
            .with("years", "2-5");
        assert_eq!(data.get_str("experience_band"), None);
        assert_eq!(data.get_str("years"), Some("2-5"));
    }

    #[test]
    fn page_element_untagged() {
        let page = Page::new(
            "intro/welcome",
            vec![
                PageElement::Raw(json!({"type": "html", "html": "<p>hi</p>"})),
                PageElement::Question(Item::new("q1", ItemKind::Text)),
            ],
        );
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["elements"][0]["type"], "html");
        assert_eq!(value["elements"][1]["id"], "q1");
        assert_eq!(page.question_ids().collect::<Vec<_>>(), vec!["q1"]);

        let back: Page = serde_json::from_value(value).unwrap();
        assert!(matches!(back.elements[0], PageElement::Raw(_)));
        assert!(matches!(back.elements[1], PageElement::Question(_)));
    }

    #[test]
    fn build_policy_default_lenient() {
        assert_eq!(BuildPolicy::default(), BuildPolicy::Lenient);
    }
}
