//! Error types for study content
//!
//! Provides error handling for:
//! - Document ingress (file → JSON value)
//! - Schema validation against the fixed document schemas
//! - Logical checks on definitions and banks

use std::path::PathBuf;

/// Errors while loading or validating study documents
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// No parser registered for file extension
    #[error("no parser registered for extension: '{0}'")]
    UnsupportedFormat(String),

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax error in source document
    #[error("syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    /// Document does not match its schema
    #[error("{document} failed schema validation: {}", .messages.join("; "))]
    Schema {
        document: String,
        messages: Vec<String>,
    },

    /// Document matched the schema but could not be interpreted
    #[error("invalid {document}: {message}")]
    Invalid { document: String, message: String },

    /// Section identifier used twice in one definition
    #[error("duplicate section id: {0}")]
    DuplicateSection(String),

    /// Content source name registered twice in one bank
    #[error("duplicate content source: {0}")]
    DuplicateSource(String),

    /// Required document not found in a study directory
    #[error("missing document: {0}")]
    MissingDocument(PathBuf),
}

impl ContentError {
    /// Create syntax error for path
    pub fn syntax_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create invalid-document error
    pub fn invalid(document: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Invalid {
            document: document.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for content operations
pub type ContentResult<T> = Result<T, ContentError>;
