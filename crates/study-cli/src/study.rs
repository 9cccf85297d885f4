//! Participant stratum derivation

use serde::{Deserialize, Serialize};
use std::fmt;
use study_content::{SectionKind, StudyDefinition};
use study_engine::ParticipantData;
use study_strategy::{SelectionKind, StrategyRegistry};

/// Participant field holding years of experience
pub const YEARS_FIELD: &str = "years";

/// Participant field holding highest training level
pub const TRAINING_FIELD: &str = "training";

/// Experience cohort used as stratum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceBand {
    /// Up to a year, or awareness-level training at most
    Novice,
    /// Two to five years, or level-1 training
    Intermediate,
    /// Everyone else
    Advanced,
}

impl ExperienceBand {
    /// Band from answers like `"0-1"`/`"2-5"`/`"6+"` and
    /// `"none"`/`"awareness"`/`"level1"`/`"level2"`
    ///
    /// The lower band wins when the two answers disagree.
    #[must_use]
    pub fn derive(years: &str, training: &str) -> Self {
        let years = years.trim();
        let training = training.trim().to_ascii_lowercase();

        if years == "0-1" || matches!(training.as_str(), "none" | "awareness") {
            Self::Novice
        } else if years == "2-5" || training == "level1" {
            Self::Intermediate
        } else {
            Self::Advanced
        }
    }

    /// Stratum name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novice => "novice",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for ExperienceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant field the first stratified block group reads its stratum from
#[must_use]
pub fn stratum_field<'d>(definition: &'d StudyDefinition, registry: &StrategyRegistry) -> Option<&'d str> {
    definition
        .sections
        .iter()
        .filter(|s| s.kind == SectionKind::BlockGroup)
        .filter_map(|s| s.selection.as_ref())
        .find(|spec| registry.resolve(&spec.strategy) == Some(SelectionKind::Stratified))
        .and_then(|spec| spec.stratum_field.as_deref())
}

/// Stratum for a participant, deriving and recording it when absent
///
/// A participant who already carries the stratum field keeps it. Otherwise,
/// when years or training are present, the experience band is derived and
/// written into the stratum field so the engine sees the same value.
pub fn participant_stratum(
    definition: &StudyDefinition,
    registry: &StrategyRegistry,
    participant: &mut ParticipantData,
) -> Option<String> {
    let field = stratum_field(definition, registry)?;
    if let Some(existing) = participant.get_str(field) {
        return Some(existing.to_string());
    }

    let years = participant.get_str(YEARS_FIELD).map(str::to_string);
    let training = participant.get_str(TRAINING_FIELD).map(str::to_string);
    if years.is_none() && training.is_none() {
        return None;
    }
    let band = ExperienceBand::derive(
        years.as_deref().unwrap_or_default(),
        training.as_deref().unwrap_or_default(),
    );
    participant.insert(field, band.as_str());
    Some(band.as_str().to_string())
}
