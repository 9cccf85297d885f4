//! Balance simulation
//!
//! Drives assign/submit cycles through a fresh in-memory service and
//! reports the resulting counters per stratum. Participants who do not
//! complete are allocated but never counted.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use study_assign::{
    AllocationStore, AssignError, BalanceSnapshot, MemoryStore, StratifiedBalancer,
    SubmissionPayload, SubmissionService,
};
use tracing::debug;

/// Simulation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Participants to run
    pub participants: usize,
    /// Candidate item types
    pub item_types: Vec<String>,
    /// Strata, drawn uniformly per participant (empty means global)
    pub strata: Vec<String>,
    /// Share of participants who submit, in `0.0..=1.0`
    pub completion_rate: f64,
    /// Seed for strata draws, completion and tie-breaks
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            participants: 100,
            item_types: Vec::new(),
            strata: Vec::new(),
            completion_rate: 1.0,
            seed: 42,
        }
    }
}

/// Outcome of a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Participants allocated
    pub participants: usize,
    /// Participants who submitted
    pub submitted: usize,
    /// Counters per stratum, sorted by stratum
    pub strata: Vec<BalanceSnapshot>,
}

impl SimulationReport {
    /// Largest item-count spread across strata
    #[must_use]
    pub fn max_spread(&self, item_types: &[String]) -> u64 {
        self.strata
            .iter()
            .map(|s| s.spread_over(item_types))
            .max()
            .unwrap_or(0)
    }
}

/// Run the simulation
///
/// # Errors
/// Invalid parameters (fewer than two item types) surfaced by the balancer
pub async fn run_simulation(config: &SimulationConfig) -> Result<SimulationReport, AssignError> {
    let store = Arc::new(MemoryStore::new());
    let balancer = Arc::new(StratifiedBalancer::with_seed(store.clone(), config.seed));
    let service = SubmissionService::new(balancer.clone());
    let mut rng = StdRng::seed_from_u64(config.seed);
    let rate = config.completion_rate.clamp(0.0, 1.0);

    let mut submitted = 0;
    for i in 0..config.participants {
        let participant_id = format!("sim-{i:06}");
        let stratum = config.strata.choose(&mut rng).map(String::as_str);
        let allocation = balancer
            .assign(&participant_id, stratum, &config.item_types)
            .await?;

        if rng.gen_bool(rate) {
            let payload = SubmissionPayload::new(participant_id)
                .with_pair(&allocation.pair, allocation.stratum.clone());
            service.submit(payload).await?;
            submitted += 1;
        } else {
            debug!(participant = i, "abandoned");
        }
    }
    service.reconcile().await;

    let mut strata = Vec::new();
    for stratum in store.strata().await.map_err(AssignError::AllocationUnavailable)? {
        strata.push(balancer.snapshot(Some(&stratum)).await?);
    }

    Ok(SimulationReport {
        participants: config.participants,
        submitted,
        strata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<String> {
        ["storm", "wind", "persistent", "cornice"].iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn balanced_per_stratum() {
        let config = SimulationConfig {
            participants: 90,
            item_types: items(),
            strata: vec!["novice".into(), "intermediate".into(), "advanced".into()],
            ..SimulationConfig::default()
        };
        let report = run_simulation(&config).await.unwrap();
        assert_eq!(report.submitted, 90);
        assert_eq!(report.strata.len(), 3);
        assert!(report.max_spread(&config.item_types) <= 1);
        let total: u64 = report.strata.iter().map(BalanceSnapshot::total_items).sum();
        assert_eq!(total, 180);
    }

    #[tokio::test]
    async fn abandoned_sessions_not_counted() {
        let config = SimulationConfig {
            participants: 50,
            item_types: items(),
            completion_rate: 0.0,
            ..SimulationConfig::default()
        };
        let report = run_simulation(&config).await.unwrap();
        assert_eq!(report.submitted, 0);
        assert!(report.strata.is_empty());
    }

    #[tokio::test]
    async fn needs_two_item_types() {
        let config = SimulationConfig {
            participants: 1,
            item_types: vec!["storm".into()],
            ..SimulationConfig::default()
        };
        assert!(run_simulation(&config).await.unwrap_err().is_client_error());
    }
}
