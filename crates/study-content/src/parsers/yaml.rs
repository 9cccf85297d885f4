//! YAML document parser
//!
//! Only the first document of a multi-document stream is used. Anchors and
//! aliases are resolved by serde_yaml before conversion.

use crate::error::ContentError;
use crate::parsers::DocumentParser;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// YAML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl YamlParser {
    /// Create new YAML parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for YamlParser {
    fn parse(&self, path: &Path, content: &str) -> Result<Value, ContentError> {
        let first = serde_yaml::Deserializer::from_str(content)
            .next()
            .ok_or_else(|| ContentError::syntax_error(path, "empty YAML document"))?;

        let yaml = serde_yaml::Value::deserialize(first)
            .map_err(|e| ContentError::syntax_error(path, format!("YAML parse error: {e}")))?;
        if yaml.is_null() {
            return Err(ContentError::syntax_error(path, "empty YAML document"));
        }

        // Non-string mapping keys have no JSON form
        serde_json::to_value(yaml)
            .map_err(|e| ContentError::syntax_error(path, format!("YAML is not JSON-compatible: {e}")))
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}
