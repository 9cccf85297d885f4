//! Study engine
//!
//! Walks the definition's sections in order, evaluates conditionals,
//! delegates page construction to the [`SectionBuilder`] and assembles the
//! final [`Survey`].

use crate::builder::{BuildInputs, SectionBuilder};
use crate::error::{BuildError, ConfigError};
use crate::hook::AfterBlockHook;
use crate::types::{BuildPolicy, BuildWarning, Page, ParticipantData, Survey, SurveySettings};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use study_content::{Configuration, ContentBank, Section, StudyDefinition};
use study_strategy::{BlockAllocation, StrategyRegistry};
use tracing::{debug, info, warn};

/// Interprets one study for any number of participants
///
/// Holds borrowed, read-only inputs; builds never mutate them.
#[derive(Debug, Clone)]
pub struct StudyEngine<'a> {
    definition: &'a StudyDefinition,
    bank: &'a ContentBank,
    configuration: &'a Configuration,
    hook: Option<Arc<dyn AfterBlockHook>>,
    policy: BuildPolicy,
    registry: StrategyRegistry,
}

impl<'a> StudyEngine<'a> {
    /// Create engine with lenient policy and no hook
    #[must_use]
    pub fn new(
        definition: &'a StudyDefinition,
        bank: &'a ContentBank,
        configuration: &'a Configuration,
    ) -> Self {
        Self {
            definition,
            bank,
            configuration,
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

    /// With strategy registry (e.g. extra aliases)
    #[must_use]
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build the ordered page list for one participant
    ///
    /// # Errors
    /// Under [`BuildPolicy::Strict`], the first section error. Under
    /// [`BuildPolicy::Lenient`] errors become [`BuildWarning`]s.
    pub fn build<R: Rng + ?Sized>(
        &self,
        participant: &ParticipantData,
        allocation: Option<&BlockAllocation>,
        rng: &mut R,
    ) -> Result<Survey, BuildError> {
        let builder = SectionBuilder::new()
            .with_registry(self.registry.clone())
            .with_hook(self.hook.as_deref());
        let inputs = BuildInputs {
            bank: self.bank,
            configuration: self.configuration,
            participant,
            allocation,
        };

        let mut pages = Vec::new();
        let mut selected_blocks = Vec::new();
        let mut warnings = Vec::new();

        for section in &self.definition.sections {
            let outcome = self
                .include(section)
                .map_err(BuildError::from)
                .and_then(|included| {
                    if included {
                        builder.build_section(section, &inputs, rng).map(Some).map_err(BuildError::from)
                    } else {
                        Ok(None)
                    }
                });

            match outcome {
                Ok(Some(out)) => {
                    debug!(section = %section.id, pages = out.pages.len(), "built section");
                    pages.extend(out.pages);
                    selected_blocks.extend(out.selected);
                }
                Ok(None) => debug!(section = %section.id, "section condition not met, skipped"),
                Err(e) if self.policy == BuildPolicy::Lenient => {
                    warn!(section = %section.id, error = %e, "skipping section");
                    warnings.push(BuildWarning {
                        section: section.id.clone(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        dedupe_names(&mut pages);
        info!(
            study_id = %self.definition.study_id,
            pages = pages.len(),
            skipped = warnings.len(),
            "built survey"
        );

        Ok(Survey {
            study_id: self.definition.study_id.clone(),
            pages,
            settings: SurveySettings {
                ui: self.configuration.ui.clone(),
                quiz: self.configuration.quiz.clone(),
            },
            selected_blocks,
            warnings,
        })
    }

    fn include(&self, section: &Section) -> Result<bool, ConfigError> {
        let Some(condition) = &section.conditional else {
            return Ok(true);
        };
        condition
            .evaluate(self.configuration)
            .ok_or_else(|| ConfigError::UnresolvedField {
                section: section.id.clone(),
                field: condition.field.clone(),
            })
    }
}

/// Build with a thread-local RNG and the default lenient policy
///
/// # Errors
/// Never under the lenient policy; kept fallible for signature parity with
/// [`StudyEngine::build`]
pub fn build_survey(
    definition: &StudyDefinition,
    bank: &ContentBank,
    configuration: &Configuration,
    participant: &ParticipantData,
    allocation: Option<&BlockAllocation>,
) -> Result<Survey, BuildError> {
    StudyEngine::new(definition, bank, configuration).build(
        participant,
        allocation,
        &mut rand::thread_rng(),
    )
}

/// Make page names unique by suffixing repeats with `~2`, `~3`, ...
fn dedupe_names(pages: &mut [Page]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(pages.len());
    for page in pages.iter_mut() {
        if seen.insert(page.name.clone()) {
            continue;
        }
        let mut n = 2;
        let unique = loop {
            let candidate = format!("{}~{n}", page.name);
            if !seen.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        warn!(page = %page.name, renamed = %unique, "duplicate page name");
        seen.insert(unique.clone());
        page.name = unique;
    }
}
