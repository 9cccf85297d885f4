//! Core types for the assignment service
//!
//! Defines:
//! - Canonical pair keys
//! - Persisted allocations and their wire shape
//! - Assign/submit request and response bodies
//! - Balance snapshots

use crate::error::AssignError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Stratum used when none is supplied
pub const GLOBAL_STRATUM: &str = "global";

/// Normalise an optional stratum (`None` or empty → `"global"`)
#[must_use]
pub fn normalize_stratum(stratum: Option<&str>) -> String {
    match stratum.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => GLOBAL_STRATUM.to_string(),
    }
}

/// Unordered pair of distinct item-types in canonical (sorted) order
///
/// Serializes as a two-element array `["a", "b"]` with `a < b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    /// Create canonical pair
    ///
    /// # Errors
    /// `AssignError::SelfPair` if `a == b`
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Result<Self, AssignError> {
        let (a, b) = (a.into(), b.into());
        if a == b {
            return Err(AssignError::SelfPair(a));
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { first, second })
    }

    /// Lexicographically smaller item-type
    #[inline]
    #[must_use]
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Lexicographically larger item-type
    #[inline]
    #[must_use]
    pub fn second(&self) -> &str {
        &self.second
    }

    /// Check if the pair contains an item-type
    #[inline]
    #[must_use]
    pub fn contains(&self, item_type: &str) -> bool {
        self.first == item_type || self.second == item_type
    }

    /// Both item-types, canonical order
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        vec![self.first.clone(), self.second.clone()]
    }
}

impl TryFrom<Vec<String>> for PairKey {
    type Error = AssignError;

    fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
        match <[String; 2]>::try_from(items) {
            Ok([a, b]) => Self::new(a, b),
            Err(items) => Err(AssignError::invalid(format!(
                "pair must have exactly two item types, got {}",
                items.len()
            ))),
        }
    }
}

impl From<PairKey> for Vec<String> {
    fn from(pair: PairKey) -> Self {
        vec![pair.first, pair.second]
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.first, self.second)
    }
}

/// Wire shape of an allocation: `{"pair": [a, b], "stratum": s}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Allocated pair
    pub pair: PairKey,

    /// Stratum the pair was balanced in
    pub stratum: String,
}

/// Persisted, immutable allocation for one (participant, stratum)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Participant identifier
    pub participant_id: String,

    /// Stratum
    pub stratum: String,

    /// Allocated pair
    pub pair: PairKey,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    /// Create allocation stamped now
    #[must_use]
    pub fn new(participant_id: impl Into<String>, stratum: impl Into<String>, pair: PairKey) -> Self {
        Self {
            participant_id: participant_id.into(),
            stratum: stratum.into(),
            pair,
            created_at: Utc::now(),
        }
    }

    /// Wire shape
    #[must_use]
    pub fn assignment(&self) -> Assignment {
        Assignment {
            pair: self.pair.clone(),
            stratum: self.stratum.clone(),
        }
    }
}

impl From<Allocation> for Assignment {
    fn from(allocation: Allocation) -> Self {
        Self {
            pair: allocation.pair,
            stratum: allocation.stratum,
        }
    }
}

/// Body of `POST .../assign`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRequest {
    /// Participant identifier
    #[serde(default)]
    pub p_uuid: String,

    /// Stratum (`"global"` when absent or empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_stratum: Option<String>,

    /// Candidate item-types
    #[serde(default, alias = "p_ap_list")]
    pub p_item_type_list: Vec<String>,
}

impl AssignRequest {
    /// Create request
    #[must_use]
    pub fn new(participant_id: impl Into<String>, stratum: Option<String>, candidates: Vec<String>) -> Self {
        Self {
            p_uuid: participant_id.into(),
            p_stratum: stratum,
            p_item_type_list: candidates,
        }
    }

    /// Check required fields
    ///
    /// # Errors
    /// `InvalidRequest` naming the first missing field
    pub fn validate(&self) -> Result<(), AssignError> {
        if self.p_uuid.trim().is_empty() {
            return Err(AssignError::invalid("p_uuid is required"));
        }
        if self.p_item_type_list.is_empty() {
            return Err(AssignError::invalid("p_item_type_list is required"));
        }
        Ok(())
    }
}

/// Submitted response payload
///
/// Unknown keys are kept in `extra` and stored with the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Participant identifier
    #[serde(default)]
    pub uuid: String,

    /// Study identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,

    /// Pair the participant completed (empty if none)
    #[serde(default)]
    pub pair: Vec<String>,

    /// Stratum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratum: Option<String>,

    /// Answers keyed by question id
    #[serde(default)]
    pub answers: Value,

    /// Timing data
    #[serde(default)]
    pub timings: Value,

    /// Recruited through the panel
    #[serde(default)]
    pub panel_member: bool,

    /// Bank version the survey was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_version: Option<String>,

    /// Configuration version the survey was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,

    /// Any other keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubmissionPayload {
    /// Create payload for a participant
    #[must_use]
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ..Self::default()
        }
    }

    /// With completed pair
    #[must_use]
    pub fn with_pair(mut self, pair: &PairKey, stratum: impl Into<String>) -> Self {
        self.pair = pair.to_vec();
        self.stratum = Some(stratum.into());
        self
    }

    /// Canonical pair, if the payload names one
    ///
    /// # Errors
    /// `InvalidRequest` for a pair that is not two item-types, `SelfPair`
    /// for a repeated item-type
    pub fn pair_key(&self) -> Result<Option<PairKey>, AssignError> {
        if self.pair.is_empty() {
            return Ok(None);
        }
        PairKey::try_from(self.pair.clone()).map(Some)
    }
}

/// Body of `POST .../submit`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Payload
    #[serde(default)]
    pub p_payload: Option<SubmissionPayload>,
}

/// Reply to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Payload was stored
    pub success: bool,
}

/// Pair count entry in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    /// Pair
    pub pair: PairKey,
    /// Completed submissions
    pub count: u64,
}

/// Balance counters for one stratum at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Stratum
    pub stratum: String,

    /// Per item-type counts
    pub item_counts: BTreeMap<String, u64>,

    /// Per pair counts, canonical pair order
    pub pair_counts: Vec<PairCount>,
}

impl BalanceSnapshot {
    /// Count for one item-type (0 if never counted)
    #[must_use]
    pub fn item_count(&self, item_type: &str) -> u64 {
        self.item_counts.get(item_type).copied().unwrap_or(0)
    }

    /// Count for one pair (0 if never counted)
    #[must_use]
    pub fn pair_count(&self, pair: &PairKey) -> u64 {
        self.pair_counts
            .iter()
            .find(|p| &p.pair == pair)
            .map_or(0, |p| p.count)
    }

    /// Max minus min count over the counted item-types
    #[must_use]
    pub fn spread(&self) -> u64 {
        let max = self.item_counts.values().max().copied().unwrap_or(0);
        let min = self.item_counts.values().min().copied().unwrap_or(0);
        max - min
    }

    /// Max minus min count over `candidates` (uncounted ones count 0)
    #[must_use]
    pub fn spread_over<S: AsRef<str>>(&self, candidates: &[S]) -> u64 {
        let counts: Vec<u64> = candidates.iter().map(|c| self.item_count(c.as_ref())).collect();
        let max = counts.iter().max().copied().unwrap_or(0);
        let min = counts.iter().min().copied().unwrap_or(0);
        max - min
    }

    /// Sum of all item counts (twice the number of counted submissions)
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.item_counts.values().sum()
    }
}
