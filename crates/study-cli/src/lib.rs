//! Study CLI
//!
//! Host side of the study engine:
//! 1. **Build**: derive a participant's stratum, obtain a balanced pair from
//!    the assignment service (or pair locally when it is down) and build
//!    the survey
//! 2. **Serve**: expose assign/submit and the study's content over HTTP
//!
//! Also hosts the bank linter front end and a balance simulator.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use study_cli::prelude::*;
//!
//! let bundle = Arc::new(StudyBundle::load_dir(Path::new("studies/avalanche_2025"))?);
//! let host = StudyHost::new(bundle, local_client());
//! let prepared = host.prepare("p-1", participant, &mut rng).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod host;
pub mod http_client;
pub mod logging;
pub mod server;
pub mod simulate;
pub mod study;

// Re-exports
pub use config::{HostConfig, LogFormat, Mode};
pub use host::{block_allocation, shuffled_block_allocation, PreparedSurvey, StudyHost};
pub use http_client::HttpAssignmentClient;
pub use server::{router, serve, ApiError, AppState};
pub use simulate::{run_simulation, SimulationConfig, SimulationReport};
pub use study::{participant_stratum, stratum_field, ExperienceBand};

use std::sync::Arc;
use study_assign::{AssignmentClient, LocalAssignmentClient, MemoryStore, StratifiedBalancer, SubmissionService};

/// Assignment client for `config.mode`
///
/// Local mode runs a balancer over a fresh in-memory store, so allocations
/// last for the life of the process.
///
/// # Errors
/// Invalid configuration, or HTTP client construction failure
pub fn client_for(config: &HostConfig) -> anyhow::Result<Arc<dyn AssignmentClient>> {
    config.validate()?;
    Ok(match config.mode {
        Mode::Local => local_client(),
        Mode::Networked => Arc::new(HttpAssignmentClient::from_config(config)?),
    })
}

/// In-process client over a fresh memory store
#[must_use]
pub fn local_client() -> Arc<dyn AssignmentClient> {
    let balancer = Arc::new(StratifiedBalancer::new(Arc::new(MemoryStore::new())));
    let submissions = Arc::new(SubmissionService::new(balancer.clone()));
    Arc::new(LocalAssignmentClient::new(balancer, submissions))
}

/// Common imports for hosts
pub mod prelude {
    pub use crate::{client_for, local_client, HostConfig, Mode, PreparedSurvey, StudyHost};
    pub use std::path::Path;
    pub use std::sync::Arc;
    pub use study_content::StudyBundle;
    pub use study_engine::ParticipantData;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
