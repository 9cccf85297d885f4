//! Content bank: named sources of blocks, flat items, or page sets

use crate::error::ContentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use study_strategy::Balanced;

/// A named group of items sharing one item-type (a testlet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Balancing key, unique within its block group
    #[serde(alias = "ap_type")]
    pub item_type: String,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Items in authored order
    pub items: Vec<Item>,
}

impl Block {
    /// Create block
    #[must_use]
    pub fn new(item_type: impl Into<String>, label: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            item_type: item_type.into(),
            label: label.into(),
            items,
        }
    }
}

impl Balanced for Block {
    fn balance_key(&self) -> &str {
        &self.item_type
    }
}

/// A single question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Identifier, unique within the bank
    pub id: String,

    /// Question text
    #[serde(default, alias = "title", skip_serializing_if = "Option::is_none")]
    pub stem: Option<String>,

    /// Measured construct (used by the bank linter)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construct: Option<String>,

    /// Explanation shown with feedback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<String>,

    /// Type tag and type-specific payload
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    /// Create item with no stem
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            stem: None,
            construct: None,
            explain: None,
            kind,
        }
    }

    /// With stem
    #[must_use]
    pub fn with_stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = Some(stem.into());
        self
    }

    /// With construct
    #[must_use]
    pub fn with_construct(mut self, construct: impl Into<String>) -> Self {
        self.construct = Some(construct.into());
        self
    }

    /// With explanation
    #[must_use]
    pub fn with_explain(mut self, explain: impl Into<String>) -> Self {
        self.explain = Some(explain.into());
        self
    }
}

/// Question type with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// Single choice
    #[serde(alias = "radiogroup")]
    Choice {
        /// Options
        #[serde(default)]
        choices: Vec<Choice>,
        /// Correct option value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },

    /// Multiple choice
    Checkbox {
        /// Options
        #[serde(default)]
        choices: Vec<Choice>,
        /// Correct option values
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        keys: Vec<String>,
    },

    /// Grid of rows answered on a shared column scale
    Matrix {
        /// Row statements
        rows: Vec<Choice>,
        /// Column scale
        columns: Vec<Choice>,
    },

    /// Numeric rating scale
    Rating {
        /// Lowest value
        #[serde(default = "default_rating_min")]
        min: i64,
        /// Highest value
        #[serde(default = "default_rating_max")]
        max: i64,
    },

    /// Free text
    Text,

    /// Question type this version does not know
    #[serde(other)]
    Unknown,
}

fn default_rating_min() -> i64 {
    1
}

fn default_rating_max() -> i64 {
    5
}

impl ItemKind {
    /// Type tag as written in banks
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Choice { .. } => "choice",
            Self::Checkbox { .. } => "checkbox",
            Self::Matrix { .. } => "matrix",
            Self::Rating { .. } => "rating",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }

    /// Options, for choice-like types
    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        match self {
            Self::Choice { choices, .. } | Self::Checkbox { choices, .. } => choices,
            _ => &[],
        }
    }
}

/// One option (or matrix row/column)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Stored value
    pub value: String,

    /// Display text (defaults to the value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Choice {
    /// Create choice whose text is its value
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: None,
        }
    }
}

/// A pre-structured page, emitted verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    /// Page name (re-prefixed by the engine)
    pub name: String,

    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Opaque elements for the renderer
    #[serde(default)]
    pub elements: Vec<Value>,
}

/// `{pages: [...]}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSet {
    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Pages in order
    pub pages: Vec<SourcePage>,
}

/// One named content source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentSource {
    /// Block group
    Blocks(Vec<Block>),
    /// Flat item list
    Items(Vec<Item>),
    /// Pre-structured pages
    Pages(PageSet),
}

impl ContentSource {
    /// Short description of the variant, for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Blocks(_) => "blocks",
            Self::Items(_) => "items",
            Self::Pages(_) => "pages",
        }
    }

    /// Items held directly or through blocks
    pub fn items(&self) -> Box<dyn Iterator<Item = &Item> + '_> {
        match self {
            Self::Blocks(blocks) => Box::new(blocks.iter().flat_map(|b| b.items.iter())),
            Self::Items(items) => Box::new(items.iter()),
            Self::Pages(_) => Box::new(std::iter::empty()),
        }
    }
}

/// Bank document as stored on disk
///
/// Every top-level key other than the version fields is a content source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankDocument {
    /// Bank schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,

    /// Bank content version
    #[serde(default, alias = "bank_version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Named sources
    #[serde(flatten)]
    pub sources: BTreeMap<String, ContentSource>,
}

/// Mapping from source name to content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentBank {
    version: Option<String>,
    sources: BTreeMap<String, ContentSource>,
}

impl ContentBank {
    /// Create empty bank
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source
    ///
    /// # Errors
    /// `ContentError::DuplicateSource` if `name` is already registered
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        source: ContentSource,
    ) -> Result<(), ContentError> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            return Err(ContentError::DuplicateSource(name));
        }
        self.sources.insert(name, source);
        Ok(())
    }

    /// Merge every source of a bank document
    ///
    /// # Errors
    /// `ContentError::DuplicateSource` on the first name collision
    pub fn merge(&mut self, document: BankDocument) -> Result<(), ContentError> {
        if self.version.is_none() {
            self.version = document.version.or(document.schema_version);
        }
        for (name, source) in document.sources {
            self.insert(name, source)?;
        }
        Ok(())
    }

    /// Builder-style insert for fixtures
    ///
    /// # Errors
    /// Same as [`ContentBank::insert`]
    pub fn with_source(
        mut self,
        name: impl Into<String>,
        source: ContentSource,
    ) -> Result<Self, ContentError> {
        self.insert(name, source)?;
        Ok(self)
    }

    /// Get source by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ContentSource> {
        self.sources.get(name)
    }

    /// Check if source exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Iterate over sources in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentSource)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bank version, if any document declared one
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Number of sources
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if bank is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bank_document_discriminates_sources() {
        let doc: BankDocument = serde_json::from_value(json!({
            "schema_version": "1.0",
            "testlets": [
                {"ap_type": "storm", "label": "Storm slab", "items": [
                    {"id": "s1", "type": "choice", "choices": [{"value": "a"}], "key": "a"}
                ]}
            ],
            "diagnostics": [
                {"id": "d1", "type": "radiogroup", "choices": [{"value": "x"}]}
            ],
            "intro": {"pages": [{"name": "welcome", "elements": [{"type": "html"}]}]}
        }))
        .unwrap();

        assert_eq!(doc.schema_version.as_deref(), Some("1.0"));
        assert_eq!(doc.sources["testlets"].kind_name(), "blocks");
        assert_eq!(doc.sources["diagnostics"].kind_name(), "items");
        assert_eq!(doc.sources["intro"].kind_name(), "pages");

        if let ContentSource::Blocks(blocks) = &doc.sources["testlets"] {
            assert_eq!(blocks[0].item_type, "storm");
            assert_eq!(blocks[0].balance_key(), "storm");
        } else {
            panic!("expected blocks");
        }
    }

    #[test]
    fn item_kinds_deserialize() {
        let items: Vec<Item> = serde_json::from_value(json!([
            {"id": "m", "type": "matrix", "rows": [{"value": "r1"}], "columns": [{"value": "c1"}]},
            {"id": "r", "type": "rating"},
            {"id": "t", "type": "text", "title": "Anything else?"},
            {"id": "u", "type": "slider"}
        ]))
        .unwrap();

        assert_eq!(items[0].kind.tag(), "matrix");
        assert_eq!(items[1].kind, ItemKind::Rating { min: 1, max: 5 });
        assert_eq!(items[2].stem.as_deref(), Some("Anything else?"));
        assert_eq!(items[3].kind, ItemKind::Unknown);
    }

    #[test]
    fn item_serializes_type_tag() {
        let item = Item::new(
            "q1",
            ItemKind::Choice {
                choices: vec![Choice::new("a")],
                key: Some("a".to_string()),
            },
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "choice");
        assert_eq!(value["key"], "a");
        assert!(value.get("stem").is_none());
    }

    #[test]
    fn bank_rejects_duplicate_source() {
        let mut bank = ContentBank::new();
        bank.insert("a", ContentSource::Items(vec![])).unwrap();
        assert!(matches!(
            bank.insert("a", ContentSource::Items(vec![])),
            Err(ContentError::DuplicateSource(_))
        ));
    }

    #[test]
    fn bank_merge_keeps_first_version() {
        let mut bank = ContentBank::new();
        bank.merge(BankDocument {
            version: Some("v1".into()),
            ..BankDocument::default()
        })
        .unwrap();
        bank.merge(BankDocument {
            version: Some("v2".into()),
            ..BankDocument::default()
        })
        .unwrap();
        assert_eq!(bank.version(), Some("v1"));
    }

    #[test]
    fn content_source_items_flattens_blocks() {
        let source = ContentSource::Blocks(vec![
            Block::new("a", "A", vec![Item::new("a1", ItemKind::Text)]),
            Block::new("b", "B", vec![Item::new("b1", ItemKind::Text), Item::new("b2", ItemKind::Text)]),
        ]);
        let ids: Vec<_> = source.items().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1", "b2"]);
    }
}
