//! End-to-end builds over the avalanche fixture study

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use study_content::{bank_from_value, configuration_from_value, Condition, ContentBank};
use study_engine::{
    build_survey, BuildError, BuildPolicy, ConfidenceRatingHook, ParticipantData, StudyEngine,
};
use study_strategy::BlockAllocation;
use study_test_utils::{
    avalanche_bank, avalanche_bank_json, avalanche_config, avalanche_definition, ITEM_TYPES,
};

fn novice() -> ParticipantData {
    ParticipantData::new().with("experience_band", "novice")
}

fn allocation(stratum: &str, first: &str, second: &str) -> BlockAllocation {
    BlockAllocation::new(stratum, vec![first.to_string(), second.to_string()])
}

#[test]
fn test_allocated_build_page_order() {
    let (definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    let engine = StudyEngine::new(&definition, &bank, &config)
        .with_hook(Arc::new(ConfidenceRatingHook::new()));
    let alloc = allocation("novice", "wind", "storm");

    let survey = engine
        .build(&novice(), Some(&alloc), &mut StdRng::seed_from_u64(1))
        .unwrap();

    let mut expected = vec![
        "intro/welcome".to_string(),
        "intro/consent".to_string(),
        "background/experience".to_string(),
    ];
    for item_type in ["wind", "storm"] {
        for i in 1..=4 {
            expected.push(format!("testlets/{item_type}/{item_type}_{i}"));
        }
        expected.push(format!("testlets/{item_type}/confidence"));
    }
    expected.push("diagnostics/diag_1".to_string());
    expected.push("diagnostics/diag_2".to_string());

    assert_eq!(survey.page_names().collect::<Vec<_>>(), expected);
    assert_eq!(survey.item_types().collect::<Vec<_>>(), vec!["wind", "storm"]);
    assert!(survey.selected_blocks[0].allocated);
    assert!(survey.warnings.is_empty());
    assert_eq!(survey.study_id, "avalanche_2025");
}

#[test]
fn test_allocated_build_is_seed_independent() {
    let (definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    let engine = StudyEngine::new(&definition, &bank, &config);
    let alloc = allocation("novice", "cornice", "persistent");

    let reference = engine
        .build(&novice(), Some(&alloc), &mut StdRng::seed_from_u64(0))
        .unwrap();
    for seed in 1..20 {
        let survey = engine
            .build(&novice(), Some(&alloc), &mut StdRng::seed_from_u64(seed))
            .unwrap();
        assert_eq!(survey, reference, "seed {seed}");
    }
}

#[test]
fn test_without_allocation_selects_two_distinct() {
    let (definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    let engine = StudyEngine::new(&definition, &bank, &config);

    for seed in 0..20 {
        let survey = engine
            .build(&novice(), None, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        let chosen: Vec<&str> = survey.item_types().collect();
        let distinct: BTreeSet<&str> = chosen.iter().copied().collect();
        assert_eq!(chosen.len(), 2);
        assert_eq!(distinct.len(), 2);
        assert!(chosen.iter().all(|t| ITEM_TYPES.contains(t)));
        assert!(!survey.selected_blocks[0].allocated);
    }
}

#[test]
fn test_stratum_mismatch_ignores_allocation() {
    let (definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    let engine = StudyEngine::new(&definition, &bank, &config);
    let alloc = allocation("expert", "wind", "storm");

    let survey = engine
        .build(&novice(), Some(&alloc), &mut StdRng::seed_from_u64(3))
        .unwrap();
    assert!(!survey.selected_blocks[0].allocated);
    assert_eq!(survey.item_types().count(), 2);
}

#[test]
fn test_hook_respects_strata() {
    let (definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    let engine = StudyEngine::new(&definition, &bank, &config)
        .with_hook(Arc::new(ConfidenceRatingHook::new().for_strata(["expert"])));

    let survey = engine
        .build(&novice(), Some(&allocation("novice", "wind", "storm")), &mut StdRng::seed_from_u64(4))
        .unwrap();
    assert!(survey.page_names().all(|name| !name.ends_with("/confidence")));

    let expert = ParticipantData::new().with("experience_band", "expert");
    let survey = engine
        .build(&expert, Some(&allocation("expert", "wind", "storm")), &mut StdRng::seed_from_u64(4))
        .unwrap();
    let page = survey.page("testlets/storm/confidence").unwrap();
    assert_eq!(page.question_ids().collect::<Vec<_>>(), vec!["storm_confidence"]);
}

#[test]
fn test_conditional_section_skipped() {
    let (definition, bank) = (avalanche_definition(), avalanche_bank());
    let config = configuration_from_value(json!({"quiz": {"diagnostics": false}})).unwrap();

    let survey = build_survey(&definition, &bank, &config, &novice(), None).unwrap();
    assert!(survey.page_names().all(|name| !name.starts_with("diagnostics/")));
    assert!(survey.warnings.is_empty());
}

#[test]
fn test_unresolved_condition_lenient_and_strict() {
    let (mut definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    definition.sections[3].conditional = Some(Condition::equals("quiz.nope", true));
    let mut rng = StdRng::seed_from_u64(7);

    let survey = StudyEngine::new(&definition, &bank, &config)
        .build(&novice(), None, &mut rng)
        .unwrap();
    assert_eq!(survey.warnings.len(), 1);
    assert_eq!(survey.warnings[0].section, "diagnostics");
    assert!(survey.page_names().all(|name| !name.starts_with("diagnostics/")));
    assert!(survey.page("intro/welcome").is_some());

    let err = StudyEngine::new(&definition, &bank, &config)
        .with_policy(BuildPolicy::Strict)
        .build(&novice(), None, &mut rng)
        .unwrap_err();
    assert!(matches!(err, BuildError::Config(_)));
    assert_eq!(err.section(), "diagnostics");
}

#[test]
fn test_missing_source_lenient_and_strict() {
    let (mut definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    definition.sections[1].source = "no_such_source".to_string();
    let mut rng = StdRng::seed_from_u64(5);

    let survey = StudyEngine::new(&definition, &bank, &config)
        .build(&novice(), None, &mut rng)
        .unwrap();
    assert_eq!(survey.warnings.len(), 1);
    assert_eq!(survey.warnings[0].section, "background");
    assert!(survey.page_names().all(|name| !name.starts_with("background/")));
    assert!(survey.page("intro/welcome").is_some());

    let err = StudyEngine::new(&definition, &bank, &config)
        .with_policy(BuildPolicy::Strict)
        .build(&novice(), None, &mut rng)
        .unwrap_err();
    assert!(matches!(err, BuildError::Definition(_)));
    assert_eq!(err.section(), "background");
}

#[test]
fn test_grouped_questions_per_block() {
    let (definition, bank) = (avalanche_definition(), avalanche_bank());
    let config = configuration_from_value(json!({"ui": {"one_question_per_page": false}})).unwrap();
    let engine = StudyEngine::new(&definition, &bank, &config);

    let survey = engine
        .build(&novice(), Some(&allocation("novice", "storm", "wind")), &mut StdRng::seed_from_u64(6))
        .unwrap();
    let page = survey.page("testlets/storm").unwrap();
    assert_eq!(page.question_ids().count(), 4);
    assert!(survey.page("diagnostics/questions").is_some());
}

#[test]
fn test_settings_pass_through() {
    let (definition, bank, config) = (avalanche_definition(), avalanche_bank(), avalanche_config());
    let survey = build_survey(&definition, &bank, &config, &novice(), None).unwrap();
    assert_eq!(survey.settings.ui, config.ui);
    assert_eq!(survey.settings.quiz, config.quiz);
}

fn bank_with_testlet_order(order: &[usize]) -> ContentBank {
    let mut json = avalanche_bank_json();
    let testlets = json["testlets"].as_array().unwrap().clone();
    json["testlets"] = order.iter().map(|&i| testlets[i].clone()).collect();
    let mut bank = ContentBank::new();
    bank.merge(bank_from_value(json).unwrap()).unwrap();
    bank
}

proptest! {
    #[test]
    fn prop_allocated_pages_ignore_bank_order(
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        first in 0usize..4,
        offset in 1usize..4,
        seed in any::<u64>(),
    ) {
        let (definition, config) = (avalanche_definition(), avalanche_config());
        let alloc = allocation("novice", ITEM_TYPES[first], ITEM_TYPES[(first + offset) % 4]);

        let reference_bank = avalanche_bank();
        let reference = StudyEngine::new(&definition, &reference_bank, &config)
            .build(&novice(), Some(&alloc), &mut StdRng::seed_from_u64(0))
            .unwrap();

        let shuffled_bank = bank_with_testlet_order(&order);
        let survey = StudyEngine::new(&definition, &shuffled_bank, &config)
            .build(&novice(), Some(&alloc), &mut StdRng::seed_from_u64(seed))
            .unwrap();

        prop_assert_eq!(survey.page_names().collect::<Vec<_>>(), reference.page_names().collect::<Vec<_>>());
        prop_assert_eq!(
            survey.item_types().collect::<Vec<_>>(),
            vec![ITEM_TYPES[first], ITEM_TYPES[(first + offset) % 4]]
        );
    }
}
