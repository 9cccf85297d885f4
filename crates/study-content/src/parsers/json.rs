//! JSON document parser

use crate::error::ContentError;
use crate::parsers::DocumentParser;
use serde_json::Value;
use std::path::Path;

/// JSON parser
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl JsonParser {
    /// Create new JSON parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for JsonParser {
    fn parse(&self, path: &Path, content: &str) -> Result<Value, ContentError> {
        serde_json::from_str(content)
            .map_err(|e| ContentError::syntax_error(path, format!("JSON parse error: {e}")))
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }
}
