//! Strategy registry for selection strategies
//!
//! Provides [`StrategyRegistry`] for resolving the strategy names used in
//! study definitions.

use crate::strategy::SelectionKind;
use std::collections::HashMap;

/// Registry of available selection strategy names
///
/// Maps definition vocabulary to [`SelectionKind`]. Since strategies are
/// type-parameterized, they're dispatched through the kind, not as trait
/// objects.
#[derive(Debug, Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, SelectionKind>,
}

impl StrategyRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Create registry with built-in strategies
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("random", SelectionKind::Random);
        registry.register("stratified", SelectionKind::Stratified);
        registry
    }

    /// Register a strategy name (e.g. an alias such as `"balanced"`)
    pub fn register(&mut self, name: &str, kind: SelectionKind) {
        self.strategies.insert(name.to_ascii_lowercase(), kind);
    }

    /// Resolve strategy name, case-insensitively
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<SelectionKind> {
        self.strategies.get(&name.to_ascii_lowercase()).copied()
    }

    /// Check if strategy exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Remove strategy
    #[inline]
    pub fn remove(&mut self, name: &str) -> bool {
        self.strategies.remove(&name.to_ascii_lowercase()).is_some()
    }

    /// List all registered strategy names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get number of registered strategies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
