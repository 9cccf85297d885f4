//! Document parsers for different file formats
//!
//! Every parser produces a `serde_json::Value` so that schema validation
//! and typed deserialization see one representation:
//! - JSON documents via serde_json
//! - YAML documents via serde_yaml

use crate::error::ContentError;
use serde_json::Value;
use std::path::Path;

mod json;
mod yaml;

pub use json::JsonParser;
pub use yaml::YamlParser;

/// Parser trait for converting file content into a JSON document
///
/// Implement this trait to add support for new file formats.
pub trait DocumentParser: Send + Sync + 'static {
    /// Parse content string; `path` is used for error reporting only
    ///
    /// # Errors
    /// `ContentError::Syntax` if the content is malformed
    fn parse(&self, path: &Path, content: &str) -> Result<Value, ContentError>;

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Parser priority (higher = tried first when multiple parsers match)
    fn priority(&self) -> i32 {
        0
    }
}

/// Parser registration for dynamic parser management
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        default_parsers()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parser_count", &self.parsers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser
    pub fn register<P: DocumentParser>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
        // Sort by priority (higher first)
        self.parsers
            .sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find parser for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn DocumentParser> {
        self.parsers.iter().find(|p| p.can_parse(path)).map(|p| &**p)
    }

    /// Parse `content` with the parser registered for `path`
    ///
    /// # Errors
    /// `ContentError::UnsupportedFormat` if no parser matches, otherwise
    /// whatever the parser reports
    pub fn parse(&self, path: &Path, content: &str) -> Result<Value, ContentError> {
        let parser = self.find_for_path(path).ok_or_else(|| {
            ContentError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_string(),
            )
        })?;
        parser.parse(path, content)
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions())
            .copied()
            .collect()
    }
}

/// Create default parser registry with built-in parsers
#[inline]
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(JsonParser);
    registry.register(YamlParser);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperParser;

    impl DocumentParser for UpperParser {
        fn parse(&self, _path: &Path, content: &str) -> Result<Value, ContentError> {
            Ok(Value::String(content.to_uppercase()))
        }

        fn extensions(&self) -> &[&str] {
            &["up", "json"]
        }

        fn priority(&self) -> i32 {
            10
        }
    }

    #[test]
    fn parser_can_parse_by_extension() {
        assert!(JsonParser.can_parse(Path::new("file.json")));
        assert!(JsonParser.can_parse(Path::new("/path/to/file.json")));
        assert!(!JsonParser.can_parse(Path::new("file.txt")));
        assert!(!JsonParser.can_parse(Path::new("file")));
    }

    #[test]
    fn registry_default_extensions() {
        let registry = default_parsers();
        let exts = registry.all_extensions();
        assert!(exts.contains(&"json"));
        assert!(exts.contains(&"yaml"));
        assert!(exts.contains(&"yml"));
    }

    #[test]
    fn registry_priority_wins() {
        let mut registry = default_parsers();
        registry.register(UpperParser);

        let value = registry.parse(Path::new("a.json"), "x").unwrap();
        assert_eq!(value, Value::String("X".to_string()));
    }

    #[test]
    fn registry_unsupported_format() {
        let registry = default_parsers();
        let err = registry.parse(Path::new("bank.toml"), "").unwrap_err();
        assert!(matches!(err, ContentError::UnsupportedFormat(ext) if ext == "toml"));
    }

    #[test]
    fn registry_debug() {
        let registry = default_parsers();
        let debug_str = format!("{registry:?}");
        assert!(debug_str.contains("ParserRegistry"));
    }
}
