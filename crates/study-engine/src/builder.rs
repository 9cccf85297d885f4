//! Section builder
//!
//! Turns one section plus its content source into pages. Dispatch is on
//! [`SectionKind`]; unknown kinds and feedback sections produce nothing.

use crate::error::DefinitionError;
use crate::hook::{AfterBlockHook, BlockContext};
use crate::types::{Page, PageElement, ParticipantData, SelectedBlocks};
use rand::Rng;
use study_content::{Block, Configuration, ContentBank, ContentSource, Item, PageSet, Section, SectionKind};
use study_strategy::{BlockAllocation, RandomizationPlan, SelectionContext, SelectionKind, StrategyRegistry};
use tracing::{debug, warn};

/// Pages for one section plus its realized block selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionOutput {
    /// Pages in order
    pub pages: Vec<Page>,

    /// Set for block-group sections
    pub selected: Option<SelectedBlocks>,
}

/// Per-participant inputs for one build
#[derive(Debug, Clone, Copy)]
pub struct BuildInputs<'a> {
    /// Merged content
    pub bank: &'a ContentBank,

    /// Study configuration
    pub configuration: &'a Configuration,

    /// Participant attributes
    pub participant: &'a ParticipantData,

    /// Pre-computed allocation, if the host obtained one
    pub allocation: Option<&'a BlockAllocation>,
}

/// Builds pages for individual sections
#[derive(Debug, Clone)]
pub struct SectionBuilder<'h> {
    registry: StrategyRegistry,
    hook: Option<&'h dyn AfterBlockHook>,
}

impl Default for SectionBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h> SectionBuilder<'h> {
    /// Builder with the default strategy vocabulary and no hook
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: StrategyRegistry::with_defaults(),
            hook: None,
        }
    }

    /// With strategy registry
    #[must_use]
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// With after-block hook
    #[must_use]
    pub fn with_hook(mut self, hook: Option<&'h dyn AfterBlockHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Pages for one section
    ///
    /// # Errors
    /// `DefinitionError` if the source is missing or has the wrong shape
    pub fn build_pages<R: Rng + ?Sized>(
        &self,
        section: &Section,
        inputs: &BuildInputs<'_>,
        rng: &mut R,
    ) -> Result<Vec<Page>, DefinitionError> {
        self.build_section(section, inputs, rng).map(|out| out.pages)
    }

    /// Pages for one section plus the realized block selection
    ///
    /// # Errors
    /// `DefinitionError` if the source is missing or has the wrong shape
    pub fn build_section<R: Rng + ?Sized>(
        &self,
        section: &Section,
        inputs: &BuildInputs<'_>,
        rng: &mut R,
    ) -> Result<SectionOutput, DefinitionError> {
        match section.kind {
            SectionKind::Feedback => return Ok(SectionOutput::default()),
            SectionKind::Unknown => {
                warn!(section = %section.id, "unknown section type, no pages produced");
                return Ok(SectionOutput::default());
            }
            _ => {}
        }

        let source = inputs
            .bank
            .get(&section.source)
            .ok_or_else(|| DefinitionError::missing_source(&section.id, &section.source))?;
        let plan = section
            .randomization
            .unwrap_or_else(|| inputs.configuration.routing.default_randomization());

        match (section.kind, source) {
            (SectionKind::Intro | SectionKind::Background | SectionKind::Standalone, ContentSource::Pages(set)) => {
                Ok(SectionOutput {
                    pages: page_set_pages(&section.id, set),
                    selected: None,
                })
            }
            (SectionKind::Standalone, ContentSource::Items(items)) => Ok(SectionOutput {
                pages: standalone_pages(section, items, &plan, inputs.configuration, rng),
                selected: None,
            }),
            (SectionKind::BlockGroup, ContentSource::Blocks(blocks)) => {
                Ok(self.block_group(section, blocks, &plan, inputs, rng))
            }
            (kind, source) => Err(DefinitionError::SourceKindMismatch {
                section: section.id.clone(),
                source_name: section.source.clone(),
                expected: expected_shape(kind),
                found: source.kind_name(),
            }),
        }
    }

    fn strategy_for(&self, section: &Section) -> SelectionKind {
        let Some(spec) = &section.selection else {
            return SelectionKind::Random;
        };
        self.registry.resolve(&spec.strategy).unwrap_or_else(|| {
            warn!(
                section = %section.id,
                strategy = %spec.strategy,
                "unknown selection strategy, falling back to random"
            );
            SelectionKind::Random
        })
    }

    fn block_group<R: Rng + ?Sized>(
        &self,
        section: &Section,
        blocks: &[Block],
        plan: &RandomizationPlan,
        inputs: &BuildInputs<'_>,
        rng: &mut R,
    ) -> SectionOutput {
        let strategy = self.strategy_for(section);
        let count = section
            .selection
            .as_ref()
            .and_then(|s| s.count)
            .or(inputs.configuration.routing.block_count);
        let stratum = section
            .selection
            .as_ref()
            .and_then(|s| s.stratum_field.as_deref())
            .and_then(|field| inputs.participant.get_str(field));

        let ctx = SelectionContext::with_count(count)
            .stratum(stratum)
            .allocation(inputs.allocation);
        let selection = strategy.select(blocks, &ctx, rng);
        let allocated = selection.is_allocated();

        let mut chosen = selection.chosen;
        // Allocation order is authoritative
        if !allocated {
            plan.order_blocks(&mut chosen, rng);
        }
        debug!(
            section = %section.id,
            strategy = %strategy,
            allocated,
            blocks = chosen.len(),
            "selected blocks"
        );

        let per_question = inputs.configuration.ui.one_question_per_page;
        let mut pages = Vec::new();
        for (position, block) in chosen.iter().enumerate() {
            let mut items: Vec<&Item> = block.items.iter().collect();
            plan.order_block_items(&mut items, rng);

            let title = (!block.label.is_empty()).then(|| block.label.clone());
            if per_question {
                pages.extend(items.iter().map(|item| {
                    Page::new(
                        format!("{}/{}/{}", section.id, block.item_type, item.id),
                        vec![PageElement::Question((*item).clone())],
                    )
                    .with_title(title.clone())
                }));
            } else {
                pages.push(
                    Page::new(
                        format!("{}/{}", section.id, block.item_type),
                        items.iter().map(|i| PageElement::Question((*i).clone())).collect(),
                    )
                    .with_title(title),
                );
            }

            if section.after_block {
                if let Some(hook) = self.hook {
                    let ctx = BlockContext {
                        section_id: &section.id,
                        block,
                        position,
                        participant: inputs.participant,
                        stratum,
                    };
                    pages.extend(hook.after_block(&ctx).into_iter().map(|mut page| {
                        page.name = format!("{}/{}/{}", section.id, block.item_type, page.name);
                        page
                    }));
                }
            }
        }

        SectionOutput {
            pages,
            selected: Some(SelectedBlocks {
                section: section.id.clone(),
                item_types: chosen.iter().map(|b| b.item_type.clone()).collect(),
                allocated,
            }),
        }
    }
}

fn expected_shape(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::BlockGroup => "blocks",
        SectionKind::Standalone => "items or pages",
        _ => "pages",
    }
}

fn page_set_pages(section_id: &str, set: &PageSet) -> Vec<Page> {
    set.pages
        .iter()
        .map(|page| {
            Page::new(
                format!("{section_id}/{}", page.name),
                page.elements.iter().cloned().map(PageElement::Raw).collect(),
            )
            .with_title(page.title.clone())
        })
        .collect()
}

fn standalone_pages<R: Rng + ?Sized>(
    section: &Section,
    items: &[Item],
    plan: &RandomizationPlan,
    configuration: &Configuration,
    rng: &mut R,
) -> Vec<Page> {
    let mut ordered: Vec<&Item> = items.iter().collect();
    plan.order_questions(&mut ordered, rng);

    if configuration.ui.one_question_per_page {
        ordered
            .into_iter()
            .map(|item| {
                Page::new(
                    format!("{}/{}", section.id, item.id),
                    vec![PageElement::Question(item.clone())],
                )
                .with_title(section.title.clone())
            })
            .collect()
    } else if ordered.is_empty() {
        Vec::new()
    } else {
        vec![Page::new(
            format!("{}/questions", section.id),
            ordered.into_iter().map(|i| PageElement::Question(i.clone())).collect(),
        )
        .with_title(section.title.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::ConfidenceRatingHook;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use study_content::{ItemKind, SelectionSpec, SourcePage};

    fn block(item_type: &str, n: usize) -> Block {
        let items = (0..n)
            .map(|i| Item::new(format!("{item_type}_{i}"), ItemKind::Text))
            .collect();
        Block::new(item_type, "", items)
    }

    fn bank() -> ContentBank {
        ContentBank::new()
            .with_source(
                "testlets",
                ContentSource::Blocks(vec![block("storm", 2), block("wind", 2), block("cornice", 2)]),
            )
            .unwrap()
            .with_source(
                "diagnostics",
                ContentSource::Items(vec![
                    Item::new("d1", ItemKind::Text),
                    Item::new("d2", ItemKind::Text),
                ]),
            )
            .unwrap()
            .with_source(
                "intro",
                ContentSource::Pages(PageSet {
                    title: None,
                    pages: vec![SourcePage {
                        name: "welcome".into(),
                        title: Some("Welcome".into()),
                        elements: vec![json!({"type": "html"})],
                    }],
                }),
            )
            .unwrap()
    }

    fn names(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn intro_pages_prefixed() {
        let bank = bank();
        let config = Configuration::default();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let section = Section::new("intro", SectionKind::Intro, "intro");

        let pages = SectionBuilder::new()
            .build_pages(&section, &inputs, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(names(&pages), vec!["intro/welcome"]);
        assert_eq!(pages[0].title.as_deref(), Some("Welcome"));
    }

    #[test]
    fn allocation_order_and_hook() {
        let bank = bank();
        let config = Configuration::default();
        let participant = ParticipantData::new().with("band", "novice");
        let allocation = BlockAllocation::new("novice", vec!["cornice".into(), "storm".into()]);
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: Some(&allocation) };
        let section = Section::new("testlets", SectionKind::BlockGroup, "testlets")
            .with_selection(SelectionSpec::stratified("band", Some(2)))
            .with_randomization(RandomizationPlan { blocks: true, ..RandomizationPlan::fixed() })
            .with_after_block();
        let hook = ConfidenceRatingHook::new();

        let out = SectionBuilder::new()
            .with_hook(Some(&hook))
            .build_section(&section, &inputs, &mut StdRng::seed_from_u64(9))
            .unwrap();

        assert_eq!(
            names(&out.pages),
            vec![
                "testlets/cornice/cornice_0",
                "testlets/cornice/cornice_1",
                "testlets/cornice/confidence",
                "testlets/storm/storm_0",
                "testlets/storm/storm_1",
                "testlets/storm/confidence",
            ]
        );
        let selected = out.selected.unwrap();
        assert!(selected.allocated);
        assert_eq!(selected.item_types, vec!["cornice", "storm"]);
    }

    #[test]
    fn block_per_page_and_config_count() {
        let bank = bank();
        let config = Configuration::from_value(json!({
            "routing": {"block_count": 1},
            "ui": {"one_question_per_page": false}
        }))
        .unwrap();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let section = Section::new("testlets", SectionKind::BlockGroup, "testlets");

        let pages = SectionBuilder::new()
            .build_pages(&section, &inputs, &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].elements.len(), 2);
        assert!(pages[0].name.starts_with("testlets/"));
    }

    #[test]
    fn unknown_strategy_falls_back_to_random() {
        let bank = bank();
        let config = Configuration::default();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let mut section = Section::new("testlets", SectionKind::BlockGroup, "testlets");
        section.selection = Some(SelectionSpec { strategy: "thompson".into(), stratum_field: None, count: Some(2) });

        let out = SectionBuilder::new()
            .build_section(&section, &inputs, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let selected = out.selected.unwrap();
        assert!(!selected.allocated);
        assert_eq!(selected.item_types.len(), 2);
    }

    #[test]
    fn standalone_items_single_page() {
        let bank = bank();
        let config = Configuration::from_value(json!({"ui": {"one_question_per_page": false}})).unwrap();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let section = Section::new("diag", SectionKind::Standalone, "diagnostics");

        let pages = SectionBuilder::new()
            .build_pages(&section, &inputs, &mut StdRng::seed_from_u64(4))
            .unwrap();
        assert_eq!(names(&pages), vec!["diag/questions"]);
        assert_eq!(pages[0].question_ids().collect::<Vec<_>>(), vec!["d1", "d2"]);
    }

    #[test]
    fn standalone_per_question() {
        let bank = bank();
        let config = Configuration::default();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let section = Section::new("diag", SectionKind::Standalone, "diagnostics");

        let pages = SectionBuilder::new()
            .build_pages(&section, &inputs, &mut StdRng::seed_from_u64(4))
            .unwrap();
        assert_eq!(names(&pages), vec!["diag/d1", "diag/d2"]);
    }

    #[test]
    fn missing_source_and_mismatch() {
        let bank = bank();
        let config = Configuration::default();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let builder = SectionBuilder::new();
        let mut rng = StdRng::seed_from_u64(5);

        let missing = Section::new("x", SectionKind::Intro, "nope");
        assert!(matches!(
            builder.build_pages(&missing, &inputs, &mut rng),
            Err(DefinitionError::MissingSource { .. })
        ));

        let mismatch = Section::new("y", SectionKind::Standalone, "testlets");
        assert!(matches!(
            builder.build_pages(&mismatch, &inputs, &mut rng),
            Err(DefinitionError::SourceKindMismatch { expected: "items or pages", found: "blocks", .. })
        ));
    }

    #[test]
    fn feedback_and_unknown_produce_nothing() {
        let bank = bank();
        let config = Configuration::default();
        let participant = ParticipantData::new();
        let inputs = BuildInputs { bank: &bank, configuration: &config, participant: &participant, allocation: None };
        let builder = SectionBuilder::new();
        let mut rng = StdRng::seed_from_u64(6);

        for kind in [SectionKind::Feedback, SectionKind::Unknown] {
            let section = Section::new("f", kind, "missing_is_fine");
            assert!(builder.build_pages(&section, &inputs, &mut rng).unwrap().is_empty());
        }
    }
}
