//! Content bank linter
//!
//! Logical checks the structural schema cannot express.

use crate::model::{ContentBank, ContentSource, Item, ItemKind};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Lint configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintRules {
    /// Constructs every block must cover
    pub required_constructs: BTreeSet<String>,

    /// Report empty explanations as errors instead of warnings
    pub require_explanations: bool,
}

impl LintRules {
    /// Rules with the given required constructs
    #[must_use]
    pub fn with_constructs<I, S>(constructs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_constructs: constructs.into_iter().map(Into::into).collect(),
            require_explanations: false,
        }
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory
    Warning,
    /// Bank must not be published
    Error,
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    /// Severity
    pub severity: Severity,

    /// Source the finding belongs to
    pub source: String,

    /// Description
    pub message: String,
}

/// Lint result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    /// All findings in discovery order
    pub issues: Vec<LintIssue>,

    /// Number of blocks inspected
    pub blocks: usize,

    /// Number of items inspected
    pub items: usize,
}

impl LintReport {
    fn push(&mut self, severity: Severity, source: &str, message: String) {
        self.issues.push(LintIssue {
            severity,
            source: source.to_string(),
            message,
        });
    }

    /// Findings with `Severity::Error`
    pub fn errors(&self) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Findings with `Severity::Warning`
    pub fn warnings(&self) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// No errors (warnings allowed)
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// Lint every source of a bank
#[must_use]
pub fn lint_bank(bank: &ContentBank, rules: &LintRules) -> LintReport {
    let mut report = LintReport::default();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for (name, source) in bank.iter() {
        if let ContentSource::Blocks(blocks) = source {
            let mut seen_types = HashSet::new();
            for block in blocks {
                report.blocks += 1;
                if !seen_types.insert(block.item_type.as_str()) {
                    report.push(
                        Severity::Error,
                        name,
                        format!("duplicate item type \"{}\"", block.item_type),
                    );
                }

                let covered: BTreeSet<&str> =
                    block.items.iter().filter_map(|i| i.construct.as_deref()).collect();
                let missing: Vec<&str> = rules
                    .required_constructs
                    .iter()
                    .map(String::as_str)
                    .filter(|c| !covered.contains(c))
                    .collect();
                if !missing.is_empty() {
                    report.push(
                        Severity::Error,
                        name,
                        format!(
                            "block \"{}\" missing constructs: {}",
                            block.item_type,
                            missing.join(", ")
                        ),
                    );
                }
            }
        }

        for item in source.items() {
            report.items += 1;
            if !seen_ids.insert(item.id.as_str()) {
                report.push(Severity::Error, name, format!("duplicate item id \"{}\"", item.id));
            }
            lint_item(&mut report, name, item, rules);
        }
    }

    report
}

fn lint_item(report: &mut LintReport, source: &str, item: &Item, rules: &LintRules) {
    let values: Vec<&str> = item.kind.choices().iter().map(|c| c.value.as_str()).collect();

    match &item.kind {
        ItemKind::Choice { key: Some(key), .. } if !values.contains(&key.as_str()) => {
            report.push(
                Severity::Error,
                source,
                format!(
                    "item \"{}\" has key \"{key}\" not found in choices: {}",
                    item.id,
                    values.join(", ")
                ),
            );
        }
        ItemKind::Checkbox { keys, .. } => {
            for key in keys.iter().filter(|k| !values.contains(&k.as_str())) {
                report.push(
                    Severity::Error,
                    source,
                    format!("item \"{}\" has key \"{key}\" not found in choices", item.id),
                );
            }
        }
        _ => {}
    }

    let explained = item.explain.as_deref().is_some_and(|e| !e.trim().is_empty());
    if !explained && matches!(item.kind, ItemKind::Choice { .. } | ItemKind::Checkbox { .. }) {
        let severity = if rules.require_explanations {
            Severity::Error
        } else {
            Severity::Warning
        };
        report.push(
            severity,
            source,
            format!("item \"{}\" has empty or missing explanation", item.id),
        );
    }
}
