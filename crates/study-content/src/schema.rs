//! Embedded JSON Schemas for study documents
//!
//! Schemas are structural only: they pin required keys and value shapes and
//! leave type vocabularies open, so unknown section or question types still
//! load and are handled by the model's catch-all variants.

use crate::error::ContentError;
use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::sync::OnceLock;

/// Document kinds with an embedded schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Study definition
    Definition,
    /// Content bank
    Bank,
    /// Stand-alone page set
    PageSet,
    /// Study configuration
    Configuration,
}

impl DocumentKind {
    /// Human-readable name used in errors
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "study definition",
            Self::Bank => "content bank",
            Self::PageSet => "page set",
            Self::Configuration => "configuration",
        }
    }

    /// Raw schema document
    #[must_use]
    pub fn schema(&self) -> Value {
        match self {
            Self::Definition => definition_schema(),
            Self::Bank => bank_schema(),
            Self::PageSet => page_set_schema(),
            Self::Configuration => configuration_schema(),
        }
    }

    fn compiled(self) -> Result<&'static JSONSchema, ContentError> {
        static DEFINITION: OnceLock<Option<JSONSchema>> = OnceLock::new();
        static BANK: OnceLock<Option<JSONSchema>> = OnceLock::new();
        static PAGE_SET: OnceLock<Option<JSONSchema>> = OnceLock::new();
        static CONFIGURATION: OnceLock<Option<JSONSchema>> = OnceLock::new();

        let cell = match self {
            Self::Definition => &DEFINITION,
            Self::Bank => &BANK,
            Self::PageSet => &PAGE_SET,
            Self::Configuration => &CONFIGURATION,
        };
        cell.get_or_init(|| JSONSchema::compile(&self.schema()).ok())
            .as_ref()
            .ok_or_else(|| ContentError::invalid(self.as_str(), "embedded schema failed to compile"))
    }
}

/// Validate `document` against the schema for `kind`
///
/// # Errors
/// `ContentError::Schema` listing every violation as `"{pointer}: {message}"`
pub fn validate(kind: DocumentKind, document: &Value) -> Result<(), ContentError> {
    let schema = kind.compiled()?;
    if let Err(errors) = schema.validate(document) {
        let messages = errors
            .map(|e| {
                let pointer = e.instance_path.to_string();
                if pointer.is_empty() {
                    e.to_string()
                } else {
                    format!("{pointer}: {e}")
                }
            })
            .collect();
        return Err(ContentError::Schema {
            document: kind.as_str().to_string(),
            messages,
        });
    }
    Ok(())
}

fn page_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "title": {"type": "string"},
            "elements": {"type": "array"}
        }
    })
}

fn page_set_schema() -> Value {
    json!({
        "type": "object",
        "required": ["pages"],
        "properties": {
            "title": {"type": "string"},
            "pages": {"type": "array", "items": page_schema()}
        }
    })
}

fn item_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "type"],
        "properties": {
            "id": {"type": "string", "minLength": 1},
            "type": {"type": "string"},
            "choices": {"type": "array"},
            "rows": {"type": "array"},
            "columns": {"type": "array"}
        }
    })
}

fn block_schema() -> Value {
    json!({
        "type": "object",
        "required": ["items"],
        "anyOf": [{"required": ["item_type"]}, {"required": ["ap_type"]}],
        "properties": {
            "item_type": {"type": "string", "minLength": 1},
            "ap_type": {"type": "string", "minLength": 1},
            "label": {"type": "string"},
            "items": {"type": "array", "items": item_schema()}
        }
    })
}

fn definition_schema() -> Value {
    json!({
        "type": "object",
        "required": ["study_id", "sections"],
        "properties": {
            "study_id": {"type": "string", "minLength": 1},
            "version": {"type": "string"},
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "type", "source"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "type": {"type": "string"},
                        "source": {"type": "string"},
                        "selection": {
                            "type": "object",
                            "required": ["strategy"],
                            "properties": {
                                "strategy": {"type": "string"},
                                "stratum_field": {"type": "string"},
                                "count": {"type": "integer", "minimum": 0}
                            }
                        },
                        "randomization": {
                            "type": "object",
                            "properties": {
                                "blocks": {"type": "boolean"},
                                "within_block": {"type": "boolean"},
                                "questions": {"type": "boolean"}
                            }
                        },
                        "afterBlock": {"type": "boolean"},
                        "conditional": {
                            "type": "object",
                            "required": ["field"],
                            "properties": {
                                "field": {"type": "string", "minLength": 1},
                                "default": {"type": "boolean"}
                            }
                        }
                    }
                }
            }
        }
    })
}

fn bank_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "schema_version": {"type": "string"},
            "version": {"type": "string"}
        },
        "additionalProperties": {
            "anyOf": [
                {"type": "array", "items": block_schema()},
                {"type": "array", "items": item_schema()},
                page_set_schema()
            ]
        }
    })
}

fn configuration_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "routing": {
                "type": "object",
                "properties": {
                    "block_count": {"type": "integer", "minimum": 0},
                    "randomize_blocks": {"type": "boolean"},
                    "randomize_within_block": {"type": "boolean"},
                    "randomize_questions": {"type": "boolean"}
                }
            },
            "ui": {"type": "object"},
            "quiz": {
                "type": "object",
                "properties": {
                    "feedback_mode": {"enum": ["none", "off", "immediate", "end"]},
                    "show_explanations": {"type": "boolean"}
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schemas_compile() {
        for kind in [
            DocumentKind::Definition,
            DocumentKind::Bank,
            DocumentKind::PageSet,
            DocumentKind::Configuration,
        ] {
            assert!(kind.compiled().is_ok(), "{} schema", kind.as_str());
        }
    }

    #[test]
    fn definition_missing_source_reported() {
        let doc = json!({
            "study_id": "s",
            "sections": [{"id": "intro", "type": "intro"}]
        });
        let err = validate(DocumentKind::Definition, &doc).unwrap_err();
        match err {
            ContentError::Schema { document, messages } => {
                assert_eq!(document, "study definition");
                assert!(messages.iter().any(|m| m.contains("/sections/0")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn definition_unknown_section_type_valid() {
        let doc = json!({
            "study_id": "s",
            "sections": [{"id": "x", "type": "hologram", "source": "y"}]
        });
        assert!(validate(DocumentKind::Definition, &doc).is_ok());
    }

    #[test]
    fn bank_accepts_all_source_shapes() {
        let doc = json!({
            "schema_version": "1",
            "testlets": [{"ap_type": "storm", "items": [{"id": "a", "type": "choice"}]}],
            "diagnostics": [{"id": "d", "type": "text"}],
            "intro": {"pages": [{"name": "welcome"}]}
        });
        assert!(validate(DocumentKind::Bank, &doc).is_ok());
    }

    #[test]
    fn bank_rejects_scalar_source() {
        let doc = json!({"testlets": 3});
        assert!(validate(DocumentKind::Bank, &doc).is_err());
    }

    #[test]
    fn configuration_rejects_bad_feedback_mode() {
        let doc = json!({"quiz": {"feedback_mode": "sometimes"}});
        assert!(validate(DocumentKind::Configuration, &doc).is_err());
    }
}
