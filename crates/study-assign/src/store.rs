//! Persistence contract for allocations, counters and responses
//!
//! Implementations must make two operations atomic:
//! - [`AllocationStore::insert_allocation_if_absent`]: at most one allocation
//!   per (participant, stratum), losers receive the winner
//! - [`AllocationStore::increment_pair`]: pair counter and both item counters
//!   move together and no concurrent increment is lost

use crate::error::StoreError;
use crate::types::{Allocation, BalanceSnapshot, PairKey, SubmissionPayload};
use std::collections::HashMap;

/// Store used by the balancer and the submission path
#[async_trait::async_trait]
pub trait AllocationStore: Send + Sync + std::fmt::Debug {
    /// Existing allocation for (participant, stratum)
    async fn find_allocation(
        &self,
        participant_id: &str,
        stratum: &str,
    ) -> Result<Option<Allocation>, StoreError>;

    /// Insert unless one exists; returns whichever allocation is stored
    async fn insert_allocation_if_absent(
        &self,
        allocation: Allocation,
    ) -> Result<Allocation, StoreError>;

    /// Per item-type counts for a stratum (absent item-types are 0)
    async fn item_type_counts(&self, stratum: &str) -> Result<HashMap<String, u64>, StoreError>;

    /// Atomically add 1 to the pair counter and both item counters
    async fn increment_pair(&self, stratum: &str, pair: &PairKey) -> Result<(), StoreError>;

    /// All counters for a stratum
    async fn snapshot(&self, stratum: &str) -> Result<BalanceSnapshot, StoreError>;

    /// Strata that have counters
    async fn strata(&self) -> Result<Vec<String>, StoreError>;

    /// Persist a submitted payload
    async fn save_response(&self, payload: SubmissionPayload) -> Result<(), StoreError>;

    /// Delete a participant's allocations and responses; counters are kept
    ///
    /// Returns the number of records removed.
    async fn erase_participant(&self, participant_id: &str) -> Result<usize, StoreError>;
}
