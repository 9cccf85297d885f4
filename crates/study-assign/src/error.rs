//! Error types for the assignment service
//!
//! Provides error handling for:
//! - Store failures (unavailable backend, lost races, bad records)
//! - Allocation failures surfaced to hosts
//! - Counter writes that must be retried or reconciled
//! - Malformed requests

use crate::types::PairKey;

/// Persistence-layer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend cannot be reached or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Concurrent writer won and the store cannot return its record
    #[error("persistence conflict: {0}")]
    Conflict(String),

    /// Stored record could not be read back
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Check if retrying the same operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

/// Assignment service errors
#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    /// Request is missing required fields or is inconsistent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Pair of an item-type with itself
    #[error("self-pair not allowed: {0}")]
    SelfPair(String),

    /// Service cannot produce an allocation; hosts fall back locally
    #[error("allocation unavailable: {0}")]
    AllocationUnavailable(#[source] StoreError),

    /// Balance counters could not be incremented
    #[error("counter write failed for {pair} in stratum '{stratum}': {source}")]
    CounterWriteFailure {
        /// Stratum of the submission
        stratum: String,
        /// Pair that was not counted
        pair: PairKey,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Response payload could not be stored
    #[error("response not stored: {0}")]
    ResponseWrite(#[source] StoreError),

    /// Remote service replied with an unexpected status
    #[error("remote service error ({status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body or transport message
        message: String,
    },
}

impl AssignError {
    /// Create invalid-request error
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Check if the error is a client mistake (maps to HTTP 400)
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::SelfPair(_))
    }

    /// Check if the host should fall back to local pairing
    #[inline]
    #[must_use]
    pub fn should_fall_back(&self) -> bool {
        match self {
            Self::AllocationUnavailable(_) => true,
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AllocationUnavailable(e)
            | Self::CounterWriteFailure { source: e, .. }
            | Self::ResponseWrite(e) => e.is_retryable(),
            Self::Remote { status, .. } => *status >= 500,
            Self::InvalidRequest(_) | Self::SelfPair(_) => false,
        }
    }
}

/// Result type alias for assignment operations
pub type AssignResult<T> = Result<T, AssignError>;
