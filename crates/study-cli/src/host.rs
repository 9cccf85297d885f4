//! Survey preparation for one participant
//!
//! Joins the assignment client and the engine: derive the stratum, obtain
//! an allocation (falling back to a local pair when the service is down),
//! then build the page list with that allocation.

use crate::study::participant_stratum;
use anyhow::{Context, Result};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use study_assign::{assign_or_fallback, AssignRequest, Assignment, AssignmentClient};
use study_content::{ContentSource, Section, SectionKind, StudyBundle};
use study_engine::{AfterBlockHook, BuildPolicy, ParticipantData, StudyEngine, Survey};
use study_strategy::{shuffle, BlockAllocation, SelectionKind, StrategyRegistry};
use tracing::{debug, info};

/// Survey plus the allocation it was built with
#[derive(Debug, Clone, Serialize)]
pub struct PreparedSurvey {
    /// Participant id sent to the assignment service
    pub participant_id: String,

    /// Stratum used for the allocation, if the study is stratified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stratum: Option<String>,

    /// Allocation, if the study is stratified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,

    /// Built pages
    pub survey: Survey,
}

/// Allocation as the engine sees it, in canonical pair order
#[must_use]
pub fn block_allocation(assignment: &Assignment) -> BlockAllocation {
    BlockAllocation::new(assignment.stratum.clone(), assignment.pair.to_vec())
}

/// Allocation with its presentation order drawn from `rng`
///
/// The engine keeps allocated blocks in allocation order, so the canonical
/// (sorted) pair order would always show the alphabetically first type first.
#[must_use]
pub fn shuffled_block_allocation<R: Rng + ?Sized>(
    assignment: &Assignment,
    rng: &mut R,
) -> BlockAllocation {
    let mut allocation = block_allocation(assignment);
    shuffle(&mut allocation.item_types, rng);
    allocation
}

/// Builds surveys for one loaded study
pub struct StudyHost {
    bundle: Arc<StudyBundle>,
    client: Arc<dyn AssignmentClient>,
    hook: Option<Arc<dyn AfterBlockHook>>,
    policy: BuildPolicy,
    registry: StrategyRegistry,
}

impl StudyHost {
    /// Create host with lenient builds and no hook
    #[must_use]
    pub fn new(bundle: Arc<StudyBundle>, client: Arc<dyn AssignmentClient>) -> Self {
        Self {
            bundle,
            client,
            hook: None,
            policy: BuildPolicy::default(),
            registry: StrategyRegistry::with_defaults(),
        }
    }

    /// With after-block hook
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn AfterBlockHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// With section error policy
    #[must_use]
    pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Loaded study
    #[inline]
    #[must_use]
    pub fn bundle(&self) -> &StudyBundle {
        &self.bundle
    }

    fn stratified_section(&self) -> Option<&Section> {
        self.bundle.definition.sections.iter().find(|s| {
            s.kind == SectionKind::BlockGroup
                && s.selection
                    .as_ref()
                    .and_then(|spec| self.registry.resolve(&spec.strategy))
                    == Some(SelectionKind::Stratified)
        })
    }

    /// Item types of the first stratified block group, in bank order
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        match self
            .stratified_section()
            .and_then(|s| self.bundle.bank.get(&s.source))
        {
            Some(ContentSource::Blocks(blocks)) => {
                blocks.iter().map(|b| b.item_type.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Allocate (when the study is stratified) and build
    ///
    /// # Errors
    /// Assignment errors that do not warrant a fallback, or a strict-policy
    /// build error
    pub async fn prepare<R: Rng + ?Sized>(
        &self,
        participant_id: &str,
        mut participant: ParticipantData,
        rng: &mut R,
    ) -> Result<PreparedSurvey> {
        let stratum = participant_stratum(&self.bundle.definition, &self.registry, &mut participant);
        let candidates = self.candidates();

        let assignment = if candidates.len() >= 2 {
            let request = AssignRequest::new(participant_id, stratum.clone(), candidates);
            let assignment = assign_or_fallback(self.client.as_ref(), &request, rng)
                .await
                .with_context(|| format!("no allocation for participant {participant_id}"))?;
            info!(participant = %participant_id, pair = %assignment.pair, stratum = %assignment.stratum, "allocation ready");
            Some(assignment)
        } else {
            debug!(participant = %participant_id, "study has no stratified block group, building without allocation");
            None
        };

        let randomize_blocks = self
            .stratified_section()
            .and_then(|s| s.randomization)
            .unwrap_or_else(|| self.bundle.configuration.routing.default_randomization())
            .blocks;
        let allocation = match &assignment {
            Some(a) if randomize_blocks => Some(shuffled_block_allocation(a, &mut *rng)),
            Some(a) => Some(block_allocation(a)),
            None => None,
        };
        let mut engine = StudyEngine::new(
            &self.bundle.definition,
            &self.bundle.bank,
            &self.bundle.configuration,
        )
        .with_policy(self.policy)
        .with_registry(self.registry.clone());
        if let Some(hook) = &self.hook {
            engine = engine.with_hook(hook.clone());
        }
        let survey = engine
            .build(&participant, allocation.as_ref(), rng)
            .context("survey build failed")?;

        Ok(PreparedSurvey {
            participant_id: participant_id.to_string(),
            stratum,
            assignment,
            survey,
        })
    }
}
