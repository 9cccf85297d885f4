//! Error types for survey construction
//!
//! Provides error handling for:
//! - Definition/bank mismatches (missing or wrongly-shaped sources)
//! - Section conditionals that cannot be evaluated

/// Main build error type
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Definition references content the bank cannot supply
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Configuration cannot answer a section conditional
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// Section the error belongs to
    #[must_use]
    pub fn section(&self) -> &str {
        match self {
            Self::Definition(e) => e.section(),
            Self::Config(e) => e.section(),
        }
    }
}

/// Definition references content the bank cannot supply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// Source name not present in the bank
    #[error("section '{section}' references missing content source '{source_name}'")]
    MissingSource {
        /// Section id
        section: String,
        /// Referenced source name
        source_name: String,
    },

    /// Source exists but has the wrong shape for the section type
    #[error("section '{section}' expects {expected} in source '{source_name}', found {found}")]
    SourceKindMismatch {
        /// Section id
        section: String,
        /// Referenced source name
        source_name: String,
        /// Shapes the section type accepts
        expected: &'static str,
        /// Shape the source has
        found: &'static str,
    },
}

impl DefinitionError {
    /// Create missing-source error
    #[inline]
    pub fn missing_source(section: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::MissingSource {
            section: section.into(),
            source_name: source_name.into(),
        }
    }

    /// Section the error belongs to
    #[must_use]
    pub fn section(&self) -> &str {
        match self {
            Self::MissingSource { section, .. } | Self::SourceKindMismatch { section, .. } => section,
        }
    }
}

/// Configuration cannot answer a section conditional
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Conditional path does not resolve and no default is declared
    #[error("section '{section}' conditional field '{field}' is not set and has no default")]
    UnresolvedField {
        /// Section id
        section: String,
        /// Dotted path
        field: String,
    },
}

impl ConfigError {
    /// Section the error belongs to
    #[must_use]
    pub fn section(&self) -> &str {
        match self {
            Self::UnresolvedField { section, .. } => section,
        }
    }
}
