//! Stratified least-filled-bucket balancer
//!
//! Pairs are scored by `(max(count_a, count_b), count_a + count_b)` over the
//! completed-submission counts of the participant's stratum. The lowest
//! score wins; ties are broken uniformly at random.
//!
//! The combined count matters: with the max alone, a pair that repeats an
//! already-filled item can tie with a pair of two empty buckets, and random
//! tie-breaking then lets counts drift apart without bound.

use crate::error::{AssignError, StoreError};
use crate::store::AllocationStore;
use crate::types::{normalize_stratum, Allocation, BalanceSnapshot, PairKey};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Computes and persists balanced pair allocations
#[derive(Debug)]
pub struct StratifiedBalancer {
    store: Arc<dyn AllocationStore>,
    rng: Mutex<StdRng>,
}

impl StratifiedBalancer {
    /// Create balancer with an entropy-seeded tie-break generator
    #[must_use]
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create balancer with reproducible tie-breaks
    #[must_use]
    pub fn with_seed(store: Arc<dyn AllocationStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AllocationStore> {
        &self.store
    }

    /// Allocation for a participant, creating one on first call
    ///
    /// Idempotent per (participant, stratum): later calls return the stored
    /// allocation whatever the candidate list.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty participant id or fewer than two
    ///   distinct candidates (only checked when no allocation exists)
    /// - `AllocationUnavailable` when the store cannot be read or written
    pub async fn assign(
        &self,
        participant_id: &str,
        stratum: Option<&str>,
        candidates: &[String],
    ) -> Result<Allocation, AssignError> {
        if participant_id.trim().is_empty() {
            return Err(AssignError::invalid("participant id is required"));
        }
        let stratum = normalize_stratum(stratum);

        if let Some(existing) = self
            .store
            .find_allocation(participant_id, &stratum)
            .await
            .map_err(AssignError::AllocationUnavailable)?
        {
            debug!(participant = %participant_id, stratum = %stratum, pair = %existing.pair, "existing allocation");
            return Ok(existing);
        }

        let distinct: Vec<&str> = candidates
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if distinct.len() < 2 {
            return Err(AssignError::invalid(
                "at least two distinct item types are required",
            ));
        }

        let counts = self
            .store
            .item_type_counts(&stratum)
            .await
            .map_err(AssignError::AllocationUnavailable)?;
        let pair = self.least_filled_pair(&distinct, &counts)?;

        let candidate = Allocation::new(participant_id, stratum.clone(), pair);
        let stored = match self.store.insert_allocation_if_absent(candidate).await {
            Ok(stored) => stored,
            Err(StoreError::Conflict(reason)) => {
                // Lost a race; the winner is authoritative
                debug!(participant = %participant_id, %reason, "allocation conflict, reading winner");
                self.store
                    .find_allocation(participant_id, &stratum)
                    .await
                    .map_err(AssignError::AllocationUnavailable)?
                    .ok_or(AssignError::AllocationUnavailable(StoreError::Conflict(reason)))?
            }
            Err(e) => return Err(AssignError::AllocationUnavailable(e)),
        };

        info!(
            participant = %participant_id,
            stratum = %stored.stratum,
            pair = %stored.pair,
            "assigned pair"
        );
        Ok(stored)
    }

    fn least_filled_pair(
        &self,
        distinct: &[&str],
        counts: &HashMap<String, u64>,
    ) -> Result<PairKey, AssignError> {
        let count = |item: &str| counts.get(item).copied().unwrap_or(0);

        let mut best: Vec<(&str, &str)> = Vec::new();
        let mut best_score = (u64::MAX, u64::MAX);
        for (i, &a) in distinct.iter().enumerate() {
            for &b in &distinct[i + 1..] {
                let (ca, cb) = (count(a), count(b));
                let score = (ca.max(cb), ca + cb);
                if score < best_score {
                    best_score = score;
                    best.clear();
                }
                if score == best_score {
                    best.push((a, b));
                }
            }
        }

        let (a, b) = *best
            .choose(&mut *self.rng.lock())
            .ok_or_else(|| AssignError::invalid("no candidate pairs"))?;
        debug!(pair_a = a, pair_b = b, ties = best.len(), score = ?best_score, "scored pairs");
        PairKey::new(a, b)
    }

    /// Count a completed submission
    ///
    /// # Errors
    /// `CounterWriteFailure` when the store rejects the increment
    pub async fn record_submission(
        &self,
        stratum: Option<&str>,
        pair: &PairKey,
    ) -> Result<(), AssignError> {
        let stratum = normalize_stratum(stratum);
        self.store
            .increment_pair(&stratum, pair)
            .await
            .map_err(|source| {
                warn!(stratum = %stratum, pair = %pair, error = %source, "counter write failed");
                AssignError::CounterWriteFailure {
                    stratum: stratum.clone(),
                    pair: pair.clone(),
                    source,
                }
            })
    }

    /// Counters for a stratum
    ///
    /// # Errors
    /// `AllocationUnavailable` when the store cannot be read
    pub async fn snapshot(&self, stratum: Option<&str>) -> Result<BalanceSnapshot, AssignError> {
        self.store
            .snapshot(&normalize_stratum(stratum))
            .await
            .map_err(AssignError::AllocationUnavailable)
    }
}
