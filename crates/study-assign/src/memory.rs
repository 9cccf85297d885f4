//! In-memory allocation store
//!
//! Allocations and counters live in `DashMap`s; entry guards give the
//! per-key atomicity the store contract requires. Responses are appended
//! under a `parking_lot` lock.

use crate::error::StoreError;
use crate::store::AllocationStore;
use crate::types::{Allocation, BalanceSnapshot, PairCount, PairKey, SubmissionPayload};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Counters for one stratum
#[derive(Debug, Clone, Default)]
struct StratumCounters {
    items: HashMap<String, u64>,
    pairs: HashMap<PairKey, u64>,
}

/// Process-local store for tests, simulation and single-node hosts
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// (participant_id, stratum) -> allocation
    allocations: DashMap<(String, String), Allocation>,

    /// stratum -> counters
    counters: DashMap<String, StratumCounters>,

    responses: RwLock<Vec<SubmissionPayload>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored allocations
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Copy of stored responses, in arrival order
    #[must_use]
    pub fn responses(&self) -> Vec<SubmissionPayload> {
        self.responses.read().clone()
    }
}

#[async_trait::async_trait]
impl AllocationStore for MemoryStore {
    async fn find_allocation(
        &self,
        participant_id: &str,
        stratum: &str,
    ) -> Result<Option<Allocation>, StoreError> {
        let key = (participant_id.to_string(), stratum.to_string());
        Ok(self.allocations.get(&key).map(|a| a.value().clone()))
    }

    async fn insert_allocation_if_absent(
        &self,
        allocation: Allocation,
    ) -> Result<Allocation, StoreError> {
        let key = (allocation.participant_id.clone(), allocation.stratum.clone());
        let stored = match self.allocations.entry(key) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => slot.insert(allocation).value().clone(),
        };
        Ok(stored)
    }

    async fn item_type_counts(&self, stratum: &str) -> Result<HashMap<String, u64>, StoreError> {
        Ok(self
            .counters
            .get(stratum)
            .map(|c| c.items.clone())
            .unwrap_or_default())
    }

    async fn increment_pair(&self, stratum: &str, pair: &PairKey) -> Result<(), StoreError> {
        // Shard lock held for the whole update
        let mut counters = self.counters.entry(stratum.to_string()).or_default();
        *counters.pairs.entry(pair.clone()).or_insert(0) += 1;
        for item in [pair.first(), pair.second()] {
            *counters.items.entry(item.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn snapshot(&self, stratum: &str) -> Result<BalanceSnapshot, StoreError> {
        let Some(counters) = self.counters.get(stratum) else {
            return Ok(BalanceSnapshot {
                stratum: stratum.to_string(),
                ..BalanceSnapshot::default()
            });
        };

        let mut pair_counts: Vec<PairCount> = counters
            .pairs
            .iter()
            .map(|(pair, count)| PairCount {
                pair: pair.clone(),
                count: *count,
            })
            .collect();
        pair_counts.sort_by(|a, b| a.pair.cmp(&b.pair));

        Ok(BalanceSnapshot {
            stratum: stratum.to_string(),
            item_counts: counters.items.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            pair_counts,
        })
    }

    async fn strata(&self) -> Result<Vec<String>, StoreError> {
        let mut strata: Vec<String> = self.counters.iter().map(|e| e.key().clone()).collect();
        strata.sort();
        Ok(strata)
    }

    async fn save_response(&self, payload: SubmissionPayload) -> Result<(), StoreError> {
        self.responses.write().push(payload);
        Ok(())
    }

    async fn erase_participant(&self, participant_id: &str) -> Result<usize, StoreError> {
        let before = self.allocations.len();
        self.allocations.retain(|(participant, _), _| participant != participant_id);
        let mut removed = before.saturating_sub(self.allocations.len());

        let mut responses = self.responses.write();
        let kept = responses.len();
        responses.retain(|p| p.uuid != participant_id);
        removed += kept - responses.len();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_if_absent_returns_winner() {
        let store = MemoryStore::new();
        let first = Allocation::new("u1", "novice", PairKey::new("storm", "wind").unwrap());
        let second = Allocation::new("u1", "novice", PairKey::new("cornice", "persistent").unwrap());

        let won = store.insert_allocation_if_absent(first.clone()).await.unwrap();
        let lost = store.insert_allocation_if_absent(second).await.unwrap();
        assert_eq!(won, first);
        assert_eq!(lost, first);
        assert_eq!(store.allocation_count(), 1);
    }

    #[tokio::test]
    async fn allocations_keyed_by_stratum() {
        let store = MemoryStore::new();
        let pair = PairKey::new("storm", "wind").unwrap();
        store
            .insert_allocation_if_absent(Allocation::new("u1", "novice", pair.clone()))
            .await
            .unwrap();

        assert!(store.find_allocation("u1", "novice").await.unwrap().is_some());
        assert!(store.find_allocation("u1", "advanced").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn increment_updates_pair_and_items() {
        let store = MemoryStore::new();
        let pair = PairKey::new("wind", "storm").unwrap();
        store.increment_pair("novice", &pair).await.unwrap();
        store.increment_pair("novice", &pair).await.unwrap();

        let snapshot = store.snapshot("novice").await.unwrap();
        assert_eq!(snapshot.pair_count(&pair), 2);
        assert_eq!(snapshot.item_count("storm"), 2);
        assert_eq!(snapshot.item_count("wind"), 2);
        assert_eq!(snapshot.item_count("cornice"), 0);
        assert_eq!(store.strata().await.unwrap(), vec!["novice"]);
    }

    #[tokio::test]
    async fn erase_participant_keeps_counters() {
        let store = MemoryStore::new();
        let pair = PairKey::new("storm", "wind").unwrap();
        store
            .insert_allocation_if_absent(Allocation::new("u1", "novice", pair.clone()))
            .await
            .unwrap();
        store.save_response(SubmissionPayload::new("u1")).await.unwrap();
        store.save_response(SubmissionPayload::new("u2")).await.unwrap();
        store.increment_pair("novice", &pair).await.unwrap();

        assert_eq!(store.erase_participant("u1").await.unwrap(), 2);
        assert_eq!(store.allocation_count(), 0);
        assert_eq!(store.responses().len(), 1);
        assert_eq!(store.snapshot("novice").await.unwrap().pair_count(&pair), 1);
    }
}
