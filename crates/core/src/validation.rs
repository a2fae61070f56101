//! Step validators.
//!
//! Each workflow step declares exactly one pure predicate over a [`CaptureSnapshot`]. A failing
//! predicate yields a human-readable reason used for inline messaging; it is a value, not an
//! error.

use ica_types::trimmed_char_count;

use crate::components::narrative::{NarrativePhases, Phase};
use crate::config::ValidationRules;
use crate::snapshot::CaptureSnapshot;
use crate::workflow::StepId;

/// Outcome of validating a single step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepValidation {
    Valid,
    Invalid(String),
}

impl StepValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, StepValidation::Valid)
    }

    /// The failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            StepValidation::Valid => None,
            StepValidation::Invalid(reason) => Some(reason),
        }
    }
}

/// Validates `step` against the captured data.
pub fn validate(step: StepId, snapshot: &CaptureSnapshot, rules: &ValidationRules) -> StepValidation {
    match step {
        StepId::Metadata => validate_metadata(snapshot),
        StepId::Narrative => match snapshot.narrative_phases() {
            Some(phases) => validate_narrative(phases, rules),
            None => StepValidation::Invalid("No narrative has been saved yet".into()),
        },
        StepId::Clarification(phase) => validate_clarification(snapshot, phase),
        StepId::Enhancement => validate_enhancement(snapshot),
        StepId::Review => {
            if snapshot.is_submitted() {
                StepValidation::Valid
            } else {
                StepValidation::Invalid("The incident has not been submitted for analysis".into())
            }
        }
    }
}

fn validate_metadata(snapshot: &CaptureSnapshot) -> StepValidation {
    match &snapshot.incident {
        None => StepValidation::Invalid("Incident details have not been saved yet".into()),
        Some(incident) if incident.event_date_time > incident.created_at => {
            StepValidation::Invalid("The event date and time cannot be in the future".into())
        }
        Some(_) => StepValidation::Valid,
    }
}

/// The narrative is complete when at least one phase reaches the minimum trimmed length.
pub fn validate_narrative(phases: &NarrativePhases, rules: &ValidationRules) -> StepValidation {
    let longest = Phase::ALL
        .iter()
        .map(|p| trimmed_char_count(phases.get(*p)))
        .max()
        .unwrap_or(0);

    if longest >= rules.min_phase_chars {
        StepValidation::Valid
    } else {
        StepValidation::Invalid(format!(
            "At least one phase needs {} or more characters (longest has {})",
            rules.min_phase_chars, longest
        ))
    }
}

fn validate_clarification(snapshot: &CaptureSnapshot, phase: Phase) -> StepValidation {
    if snapshot.questions_for(phase).is_empty() {
        StepValidation::Invalid(format!(
            "Clarification questions for \"{}\" have not been generated",
            phase.label()
        ))
    } else {
        StepValidation::Valid
    }
}

fn validate_enhancement(snapshot: &CaptureSnapshot) -> StepValidation {
    match &snapshot.enhanced {
        None => StepValidation::Invalid("The enhanced narrative has not been generated".into()),
        Some(enhanced) if enhanced.effective_text().trim().is_empty() => {
            StepValidation::Invalid("The enhanced narrative is empty".into())
        }
        Some(_) => StepValidation::Valid,
    }
}
