//! Study Assign
//!
//! Assignment service for balanced, stratified pair allocation.
//!
//! # Core Concepts
//!
//! - [`StratifiedBalancer`]: Least-filled-bucket pair choice per stratum
//! - [`AllocationStore`]: Persistence contract with atomic insert-if-absent
//!   and atomic counter increments
//! - [`MemoryStore`]: `DashMap`-backed store
//! - [`SubmissionService`]: Store-then-count submission path with retry and
//!   a [`ReconciliationQueue`]
//! - [`AssignmentClient`]: Host-facing seam, with [`assign_or_fallback`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use study_assign::{MemoryStore, StratifiedBalancer};
//!
//! # tokio_test::block_on(async {
//! let balancer = StratifiedBalancer::with_seed(Arc::new(MemoryStore::new()), 7);
//! let candidates = vec!["storm".to_string(), "wind".to_string(), "cornice".to_string()];
//!
//! let first = balancer.assign("p-1", Some("novice"), &candidates).await.unwrap();
//! let again = balancer.assign("p-1", Some("novice"), &candidates).await.unwrap();
//! assert_eq!(first, again);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod balancer;
pub mod client;
pub mod error;
pub mod memory;
pub mod store;
pub mod submission;
pub mod types;

// Re-exports for convenience
pub use balancer::StratifiedBalancer;
pub use client::{assign_or_fallback, fallback_pair, AssignmentClient, LocalAssignmentClient};
pub use error::{AssignError, AssignResult, StoreError};
pub use memory::MemoryStore;
pub use store::AllocationStore;
pub use submission::{
    PendingIncrement, ReconcileReport, ReconciliationQueue, RetryPolicy, SubmissionService,
};
pub use types::{
    normalize_stratum, Allocation, AssignRequest, Assignment, BalanceSnapshot, PairCount,
    PairKey, SubmissionPayload, SubmitRequest, SubmitResponse, GLOBAL_STRATUM,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
