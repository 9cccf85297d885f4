//! Client seam between hosts and the assignment service
//!
//! Hosts talk to an [`AssignmentClient`]; the in-process implementation
//! wraps a balancer, networked ones live with the host. When the service
//! cannot allocate, [`assign_or_fallback`] pairs locally so the participant
//! can continue. Local pairs are not balanced and are not persisted.

use crate::balancer::StratifiedBalancer;
use crate::error::AssignError;
use crate::submission::SubmissionService;
use crate::types::{normalize_stratum, AssignRequest, Assignment, PairKey, SubmissionPayload, SubmitResponse};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Assign and submit operations as seen by a host
#[async_trait::async_trait]
pub trait AssignmentClient: Send + Sync {
    /// Allocation for a participant
    async fn assign(&self, request: &AssignRequest) -> Result<Assignment, AssignError>;

    /// Store a response and count its pair
    async fn submit(&self, payload: SubmissionPayload) -> Result<SubmitResponse, AssignError>;
}

/// In-process client over a balancer and a submission service
#[derive(Debug, Clone)]
pub struct LocalAssignmentClient {
    balancer: Arc<StratifiedBalancer>,
    submissions: Arc<SubmissionService>,
}

impl LocalAssignmentClient {
    /// Create client
    #[must_use]
    pub fn new(balancer: Arc<StratifiedBalancer>, submissions: Arc<SubmissionService>) -> Self {
        Self {
            balancer,
            submissions,
        }
    }

    /// Balancer
    #[inline]
    #[must_use]
    pub fn balancer(&self) -> &Arc<StratifiedBalancer> {
        &self.balancer
    }

    /// Submission service
    #[inline]
    #[must_use]
    pub fn submissions(&self) -> &Arc<SubmissionService> {
        &self.submissions
    }
}

#[async_trait::async_trait]
impl AssignmentClient for LocalAssignmentClient {
    async fn assign(&self, request: &AssignRequest) -> Result<Assignment, AssignError> {
        request.validate()?;
        self.balancer
            .assign(
                &request.p_uuid,
                request.p_stratum.as_deref(),
                &request.p_item_type_list,
            )
            .await
            .map(Assignment::from)
    }

    async fn submit(&self, payload: SubmissionPayload) -> Result<SubmitResponse, AssignError> {
        self.submissions.submit(payload).await
    }
}

/// Uniform random pair of distinct candidates
///
/// # Errors
/// `InvalidRequest` when fewer than two distinct candidates exist
pub fn fallback_pair<R: Rng + ?Sized>(
    candidates: &[String],
    stratum: Option<&str>,
    rng: &mut R,
) -> Result<Assignment, AssignError> {
    let distinct: Vec<&String> = candidates.iter().collect::<BTreeSet<_>>().into_iter().collect();
    let picked: Vec<&&String> = distinct.choose_multiple(rng, 2).collect();
    match picked.as_slice() {
        [a, b] => Ok(Assignment {
            pair: PairKey::new(a.as_str(), b.as_str())?,
            stratum: normalize_stratum(stratum),
        }),
        _ => Err(AssignError::invalid(
            "at least two distinct item types are required",
        )),
    }
}

/// Ask the client, pairing locally when the service is unavailable
///
/// # Errors
/// Client errors that do not warrant a fallback (e.g. invalid requests), or
/// a fallback failure
pub async fn assign_or_fallback<C, R>(
    client: &C,
    request: &AssignRequest,
    rng: &mut R,
) -> Result<Assignment, AssignError>
where
    C: AssignmentClient + ?Sized,
    R: Rng + ?Sized,
{
    match client.assign(request).await {
        Ok(assignment) => Ok(assignment),
        Err(e) if e.should_fall_back() => {
            warn!(participant = %request.p_uuid, error = %e, "assignment service unavailable, pairing locally");
            fallback_pair(&request.p_item_type_list, request.p_stratum.as_deref(), rng)
        }
        Err(e) => Err(e),
    }
}
