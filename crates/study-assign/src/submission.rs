//! Submission path
//!
//! A submission is stored first, then counted. Counting is retried with
//! exponential backoff; increments that still fail are queued for
//! [`SubmissionService::reconcile`] so counters eventually match the stored
//! responses.

use crate::balancer::StratifiedBalancer;
use crate::error::AssignError;
use crate::types::{normalize_stratum, PairKey, SubmissionPayload, SubmitResponse};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles afterwards
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no delay
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt` (1-based; attempt 1 has none)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(2)))
    }
}

/// Counter increment waiting to be replayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingIncrement {
    /// Stratum
    pub stratum: String,

    /// Pair to count
    pub pair: PairKey,

    /// Participant whose submission it belongs to
    pub participant_id: String,

    /// Attempts made so far
    pub attempts: u32,

    /// Last failure
    pub last_error: String,

    /// First queued
    pub queued_at: DateTime<Utc>,
}

/// Failed counter increments, oldest first
#[derive(Debug, Default)]
pub struct ReconciliationQueue {
    pending: Mutex<VecDeque<PendingIncrement>>,
}

impl ReconciliationQueue {
    /// Create empty queue
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an increment
    pub fn push(&self, item: PendingIncrement) {
        self.pending.lock().push_back(item);
    }

    /// Take everything queued
    pub fn drain(&self) -> Vec<PendingIncrement> {
        self.pending.lock().drain(..).collect()
    }

    /// Copy of the queue
    #[must_use]
    pub fn pending(&self) -> Vec<PendingIncrement> {
        self.pending.lock().iter().cloned().collect()
    }

    /// Number queued
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Result of a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Increments applied
    pub applied: usize,

    /// Increments still queued
    pub remaining: usize,
}

/// Stores submissions and keeps balance counters in step
#[derive(Debug)]
pub struct SubmissionService {
    balancer: Arc<StratifiedBalancer>,
    retry: RetryPolicy,
    queue: Arc<ReconciliationQueue>,
}

impl SubmissionService {
    /// Create service with the default retry policy
    #[must_use]
    pub fn new(balancer: Arc<StratifiedBalancer>) -> Self {
        Self {
            balancer,
            retry: RetryPolicy::default(),
            queue: Arc::new(ReconciliationQueue::new()),
        }
    }

    /// With retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reconciliation queue
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<ReconciliationQueue> {
        &self.queue
    }

    /// Store a payload and count its pair
    ///
    /// A counter failure after all retries does not fail the submission: the
    /// response is already stored and the increment is queued.
    ///
    /// # Errors
    /// - `InvalidRequest`/`SelfPair` for a payload without uuid or with a
    ///   malformed pair
    /// - `ResponseWrite` when the payload cannot be stored
    pub async fn submit(&self, payload: SubmissionPayload) -> Result<SubmitResponse, AssignError> {
        if payload.uuid.trim().is_empty() {
            return Err(AssignError::invalid("uuid is required in payload"));
        }
        let pair = payload.pair_key()?;
        let stratum = normalize_stratum(payload.stratum.as_deref());
        let participant_id = payload.uuid.clone();

        self.balancer
            .store()
            .save_response(payload)
            .await
            .map_err(AssignError::ResponseWrite)?;
        info!(participant = %participant_id, stratum = %stratum, "stored response");

        if let Some(pair) = pair {
            self.count_with_retry(&participant_id, &stratum, &pair).await;
        }
        Ok(SubmitResponse { success: true })
    }

    async fn count_with_retry(&self, participant_id: &str, stratum: &str, pair: &PairKey) {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();
        let mut made = 0;

        for attempt in 1..=attempts {
            made = attempt;
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.balancer.record_submission(Some(stratum), pair).await {
                Ok(()) => return,
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(attempt, error = %e, "retrying counter write");
                    last_error = e.to_string();
                }
                Err(e) => {
                    last_error = e.to_string();
                    break;
                }
            }
        }

        error!(
            participant = %participant_id,
            stratum = %stratum,
            pair = %pair,
            error = %last_error,
            "counter write failed, queued for reconciliation"
        );
        self.queue.push(PendingIncrement {
            stratum: stratum.to_string(),
            pair: pair.clone(),
            participant_id: participant_id.to_string(),
            attempts: made,
            last_error,
            queued_at: Utc::now(),
        });
    }

    /// Replay queued increments once each; failures are re-queued
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for mut item in self.queue.drain() {
            match self.balancer.record_submission(Some(&item.stratum), &item.pair).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    item.attempts += 1;
                    item.last_error = e.to_string();
                    self.queue.push(item);
                    report.remaining += 1;
                }
            }
        }
        if report.applied > 0 || report.remaining > 0 {
            info!(applied = report.applied, remaining = report.remaining, "reconciliation pass");
        }
        report
    }
}
