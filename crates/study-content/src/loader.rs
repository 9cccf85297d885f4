//! Document loaders
//!
//! Ingress pipeline for every document kind:
//!
//! ```text
//! file → ParserRegistry (by extension) → serde_json::Value → schema::validate → typed model
//! ```

use crate::error::{ContentError, ContentResult};
use crate::model::{BankDocument, Configuration, ContentBank, ContentSource, PageSet, StudyDefinition};
use crate::parsers::{default_parsers, ParserRegistry};
use crate::schema::{self, DocumentKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read and parse a document into a JSON value
///
/// # Errors
/// `Io` if the file cannot be read, `UnsupportedFormat` for unknown
/// extensions, `Syntax` for malformed content
pub fn load_document(path: &Path) -> ContentResult<Value> {
    load_with(&default_parsers(), path)
}

fn load_with(parsers: &ParserRegistry, path: &Path) -> ContentResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentError::io_error(path, e))?;
    parsers.parse(path, &content)
}

fn typed<T: DeserializeOwned>(kind: DocumentKind, value: Value) -> ContentResult<T> {
    schema::validate(kind, &value)?;
    serde_json::from_value(value).map_err(|e| ContentError::invalid(kind.as_str(), e))
}

/// Validate and interpret a definition document
///
/// # Errors
/// Schema violations, shape errors, or duplicate section ids
pub fn definition_from_value(value: Value) -> ContentResult<StudyDefinition> {
    let definition: StudyDefinition = typed(DocumentKind::Definition, value)?;
    definition.check_unique_ids()?;
    Ok(definition)
}

/// Validate and interpret a bank document
///
/// # Errors
/// Schema violations or shape errors
pub fn bank_from_value(value: Value) -> ContentResult<BankDocument> {
    typed(DocumentKind::Bank, value)
}

/// Validate and interpret a page-set document
///
/// # Errors
/// Schema violations or shape errors
pub fn page_set_from_value(value: Value) -> ContentResult<PageSet> {
    typed(DocumentKind::PageSet, value)
}

/// Validate and interpret a configuration document
///
/// # Errors
/// Schema violations or malformed option groups
pub fn configuration_from_value(value: Value) -> ContentResult<Configuration> {
    schema::validate(DocumentKind::Configuration, &value)?;
    Configuration::from_value(value)
}

/// Load a study definition file
///
/// # Errors
/// See [`load_document`] and [`definition_from_value`]
pub fn load_definition(path: &Path) -> ContentResult<StudyDefinition> {
    definition_from_value(load_document(path)?)
}

/// Load a content bank file
///
/// # Errors
/// See [`load_document`] and [`bank_from_value`]
pub fn load_bank(path: &Path) -> ContentResult<BankDocument> {
    bank_from_value(load_document(path)?)
}

/// Load a page-set file
///
/// # Errors
/// See [`load_document`] and [`page_set_from_value`]
pub fn load_page_set(path: &Path) -> ContentResult<PageSet> {
    page_set_from_value(load_document(path)?)
}

/// Load a configuration file
///
/// # Errors
/// See [`load_document`] and [`configuration_from_value`]
pub fn load_configuration(path: &Path) -> ContentResult<Configuration> {
    configuration_from_value(load_document(path)?)
}

/// Everything needed to build surveys for one study
///
/// Directory layout:
///
/// ```text
/// <dir>/definition.{json,yaml,yml}   required
/// <dir>/config.{json,yaml,yml}       optional (defaults when absent)
/// <dir>/content/*.{json,yaml,yml}    page sets (have a `pages` key) or banks
/// ```
///
/// A page-set file becomes a source named after its file stem; every
/// top-level key of a bank file becomes a source.
#[derive(Debug, Clone)]
pub struct StudyBundle {
    root: PathBuf,

    /// Study definition
    pub definition: StudyDefinition,

    /// Merged content bank
    pub bank: ContentBank,

    /// Study configuration
    pub configuration: Configuration,

    documents: BTreeMap<String, Value>,
}

impl StudyBundle {
    /// Load a study directory
    ///
    /// # Errors
    /// `MissingDocument` when no definition file exists, any loader error,
    /// or `DuplicateSource` when two content files define the same source
    pub fn load_dir(dir: &Path) -> ContentResult<Self> {
        let parsers = default_parsers();

        let definition_path = find_document(&parsers, dir, "definition")
            .ok_or_else(|| ContentError::MissingDocument(dir.join("definition.json")))?;
        let definition = definition_from_value(load_with(&parsers, &definition_path)?)?;

        let configuration = match find_document(&parsers, dir, "config") {
            Some(path) => configuration_from_value(load_with(&parsers, &path)?)?,
            None => {
                debug!(dir = %dir.display(), "no config document, using defaults");
                Configuration::default()
            }
        };

        let mut bank = ContentBank::new();
        let mut documents = BTreeMap::new();

        let content_dir = dir.join("content");
        if content_dir.is_dir() {
            for path in content_files(&parsers, &content_dir)? {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                    continue;
                };
                let value = load_with(&parsers, &path)?;

                if value.get("pages").is_some() {
                    let pages = page_set_from_value(value.clone())?;
                    bank.insert(stem.clone(), ContentSource::Pages(pages))?;
                } else {
                    bank.merge(bank_from_value(value.clone())?)?;
                }
                debug!(file = %path.display(), source = %stem, "loaded content document");
                documents.insert(stem, value);
            }
        }

        info!(
            study_id = %definition.study_id,
            sections = definition.sections.len(),
            sources = bank.len(),
            "loaded study bundle"
        );

        Ok(Self {
            root: dir.to_path_buf(),
            definition,
            bank,
            configuration,
            documents,
        })
    }

    /// Directory the bundle was loaded from
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Study identifier
    #[inline]
    #[must_use]
    pub fn study_id(&self) -> &str {
        &self.definition.study_id
    }

    /// Raw document for a content file stem, or a serialized bank source
    #[must_use]
    pub fn source_json(&self, name: &str) -> Option<Value> {
        if let Some(doc) = self.documents.get(name) {
            return Some(doc.clone());
        }
        self.bank
            .get(name)
            .and_then(|source| serde_json::to_value(source).ok())
    }

    /// Raw configuration document
    #[inline]
    #[must_use]
    pub fn configuration_json(&self) -> &Value {
        self.configuration.raw()
    }
}

fn find_document(parsers: &ParserRegistry, dir: &Path, stem: &str) -> Option<PathBuf> {
    parsers
        .all_extensions()
        .into_iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
}

fn content_files(parsers: &ParserRegistry, dir: &Path) -> ContentResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ContentError::io_error(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ContentError::io_error(dir, e))?.path();
        if path.is_file() && parsers.find_for_path(&path).is_some() {
            files.push(path);
        }
    }
    // Sorted so duplicate-source errors name the same file every run
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_from_value_checks_ids() {
        let err = definition_from_value(json!({
            "study_id": "s",
            "sections": [
                {"id": "a", "type": "intro", "source": "intro"},
                {"id": "a", "type": "feedback", "source": "x"}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, ContentError::DuplicateSection(_)));
    }

    #[test]
    fn bank_from_value_shape_error_is_invalid() {
        // Passes the structural schema, fails typed interpretation
        let err = bank_from_value(json!({
            "grid": [{"id": "m", "type": "matrix"}]
        }))
        .unwrap_err();
        assert!(matches!(err, ContentError::Invalid { .. }));
    }

    #[test]
    fn configuration_from_value_validates() {
        assert!(configuration_from_value(json!({"routing": {"block_count": -1}})).is_err());
        let config = configuration_from_value(json!({"routing": {"block_count": 3}})).unwrap();
        assert_eq!(config.routing.block_count, Some(3));
    }
}
