//! Testing utilities for the study engine workspace
//!
//! Shared fixtures (a four-testlet avalanche study) and a store with
//! injectable faults.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use study_assign::{
    Allocation, AllocationStore, BalanceSnapshot, MemoryStore, PairKey, StoreError,
    SubmissionPayload,
};
use study_content::{
    bank_from_value, configuration_from_value, definition_from_value, Configuration, ContentBank,
    StudyDefinition,
};

pub const ITEM_TYPES: [&str; 4] = ["storm", "wind", "persistent", "cornice"];

pub const CONSTRUCTS: [&str; 4] = ["development", "behaviour", "assessment", "mitigation"];

pub fn item_types() -> Vec<String> {
    ITEM_TYPES.iter().map(|s| (*s).to_string()).collect()
}

fn testlet(item_type: &str) -> serde_json::Value {
    let items: Vec<_> = CONSTRUCTS
        .iter()
        .enumerate()
        .map(|(i, construct)| {
            json!({
                "id": format!("{item_type}_{}", i + 1),
                "type": "choice",
                "construct": construct,
                "stem": format!("{item_type} question {}", i + 1),
                "choices": [{"value": "a"}, {"value": "b"}, {"value": "c"}],
                "key": "a",
                "explain": format!("Explanation for {item_type} {}", i + 1)
            })
        })
        .collect();
    json!({"ap_type": item_type, "label": format!("{item_type} problem"), "items": items})
}

pub fn avalanche_bank_json() -> serde_json::Value {
    json!({
        "schema_version": "1.0",
        "version": "2025.1",
        "testlets": ITEM_TYPES.iter().map(|t| testlet(t)).collect::<Vec<_>>(),
        "diagnostics": [
            {"id": "diag_1", "type": "choice", "construct": "assessment",
             "choices": [{"value": "yes"}, {"value": "no"}], "key": "yes", "explain": "Because."},
            {"id": "diag_2", "type": "rating", "min": 1, "max": 7}
        ],
        "ap_intro": {"pages": [
            {"name": "welcome", "title": "Welcome", "elements": [{"type": "html", "html": "<p>Welcome</p>"}]},
            {"name": "consent", "elements": [{"type": "boolean", "name": "consent"}]}
        ]},
        "background": {"pages": [
            {"name": "experience", "elements": [{"type": "dropdown", "name": "years"}]}
        ]}
    })
}

pub fn avalanche_definition_json() -> serde_json::Value {
    json!({
        "study_id": "avalanche_2025",
        "sections": [
            {"id": "intro", "type": "intro", "source": "ap_intro"},
            {"id": "background", "type": "background", "source": "background"},
            {"id": "testlets", "type": "block_group", "source": "testlets",
             "selection": {"strategy": "stratified", "stratum_field": "experience_band", "count": 2},
             "randomization": {"blocks": true, "within_block": false},
             "afterBlock": true},
            {"id": "diagnostics", "type": "standalone", "source": "diagnostics",
             "conditional": {"field": "quiz.diagnostics", "value": true, "default": true}},
            {"id": "feedback", "type": "feedback", "source": "feedback"}
        ]
    })
}

pub fn avalanche_config_json() -> serde_json::Value {
    json!({
        "routing": {"block_count": 2, "randomize_blocks": false},
        "ui": {"one_question_per_page": true},
        "quiz": {"feedback_mode": "end", "show_explanations": true}
    })
}

pub fn avalanche_definition() -> StudyDefinition {
    definition_from_value(avalanche_definition_json()).unwrap()
}

pub fn avalanche_bank() -> ContentBank {
    let mut bank = ContentBank::new();
    bank.merge(bank_from_value(avalanche_bank_json()).unwrap()).unwrap();
    bank
}

pub fn avalanche_config() -> Configuration {
    configuration_from_value(avalanche_config_json()).unwrap()
}

/// Write the avalanche study as a study directory
///
/// `definition.json`, `config.json` and `content/bank.json`, plus a
/// separate `content/feedback_pages.yaml` page set.
pub fn write_study_dir(dir: &Path) {
    let content = dir.join("content");
    std::fs::create_dir_all(&content).unwrap();
    let write = |path: PathBuf, value: &serde_json::Value| {
        std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    };
    write(dir.join("definition.json"), &avalanche_definition_json());
    write(dir.join("config.json"), &avalanche_config_json());
    write(content.join("bank.json"), &avalanche_bank_json());
    std::fs::write(
        content.join("feedback_pages.yaml"),
        "pages:\n  - name: thanks\n    elements:\n      - type: html\n        html: Thank you\n",
    )
    .unwrap();
}

/// Memory store with injectable faults
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_increments: AtomicUsize,
    reads_down: AtomicBool,
    writes_down: AtomicBool,
    conflict_with: Mutex<Option<Allocation>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` counter increments
    pub fn fail_next_increments(&self, n: usize) {
        self.failing_increments.store(n, Ordering::SeqCst);
    }

    /// Make allocation lookups and count reads fail
    pub fn set_reads_down(&self, down: bool) {
        self.reads_down.store(down, Ordering::SeqCst);
    }

    /// Make response writes fail
    pub fn set_writes_down(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    /// Next insert stores `winner` instead and reports a conflict
    pub fn lose_next_insert_to(&self, winner: Allocation) {
        *self.conflict_with.lock() = Some(winner);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads down".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AllocationStore for FlakyStore {
    async fn find_allocation(
        &self,
        participant_id: &str,
        stratum: &str,
    ) -> Result<Option<Allocation>, StoreError> {
        self.check_reads()?;
        self.inner.find_allocation(participant_id, stratum).await
    }

    async fn insert_allocation_if_absent(
        &self,
        allocation: Allocation,
    ) -> Result<Allocation, StoreError> {
        let winner = self.conflict_with.lock().take();
        if let Some(winner) = winner {
            self.inner.insert_allocation_if_absent(winner).await?;
            return Err(StoreError::Conflict("concurrent insert".into()));
        }
        self.inner.insert_allocation_if_absent(allocation).await
    }

    async fn item_type_counts(&self, stratum: &str) -> Result<HashMap<String, u64>, StoreError> {
        self.check_reads()?;
        self.inner.item_type_counts(stratum).await
    }

    async fn increment_pair(&self, stratum: &str, pair: &PairKey) -> Result<(), StoreError> {
        let failing = self
            .failing_increments
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("counter write timeout".into()));
        }
        self.inner.increment_pair(stratum, pair).await
    }

    async fn snapshot(&self, stratum: &str) -> Result<BalanceSnapshot, StoreError> {
        self.inner.snapshot(stratum).await
    }

    async fn strata(&self) -> Result<Vec<String>, StoreError> {
        self.inner.strata().await
    }

    async fn save_response(&self, payload: SubmissionPayload) -> Result<(), StoreError> {
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes down".into()));
        }
        self.inner.save_response(payload).await
    }

    async fn erase_participant(&self, participant_id: &str) -> Result<usize, StoreError> {
        self.inner.erase_participant(participant_id).await
    }
}
