//! Canned incidents and mock answers for demos and manual testing.
//!
//! Only compiled with the `sample-data` feature. The capture workflow additionally requires the
//! matching [`Capability`](crate::session::Capability) before it applies any of this.

use chrono::{DateTime, Duration, Utc};
use ica_types::NonEmptyText;

use crate::components::incident::IncidentMetadata;
use crate::components::narrative::{NarrativePhases, Phase};
use crate::error::{CaptureError, CaptureResult};

/// A prepared incident: metadata fields plus the four phase texts.
#[derive(Clone, Copy, Debug)]
pub struct SampleIncident {
    pub participant_name: &'static str,
    pub location: &'static str,
    pub hours_ago: i64,
    pub before_event: &'static str,
    pub during_event: &'static str,
    pub end_event: &'static str,
    pub post_event: &'static str,
}

const SAMPLES: &[SampleIncident] = &[
    SampleIncident {
        participant_name: "Jane Doe",
        location: "Hall A, community centre",
        hours_ago: 3,
        before_event: "Jane was waiting in Hall A for the afternoon bus. She had been calm during \
                       lunch and was chatting with two other participants.",
        during_event: "When the bus was announced as late, Jane became distressed, raised her voice \
                       and slipped on the wet floor near the entrance while walking away.",
        end_event: "Staff helped Jane to a chair and she settled after about ten minutes of quiet \
                    conversation with her key worker.",
        post_event: "First aid was given for a bruised knee. Her family and support coordinator \
                     were phoned that evening.",
    },
    SampleIncident {
        participant_name: "Tom Nguyen",
        location: "Kitchen, shared residence",
        hours_ago: 20,
        before_event: "Tom was preparing breakfast with support. His morning medication had been \
                       given at the usual time.",
        during_event: "Tom refused to hand over a kitchen knife after finishing, and held it while \
                       pacing the room for several minutes.",
        end_event: "Tom put the knife down on the bench after staff stepped back and offered him a \
                    break outside.",
        post_event: "",
    },
    SampleIncident {
        participant_name: "Priya Shah",
        location: "Day program van",
        hours_ago: 48,
        before_event: "",
        during_event: "During the trip back from the day program Priya unbuckled her seatbelt and \
                       tried to open the sliding door while the van was moving.",
        end_event: "The driver pulled over safely and Priya agreed to sit back down once the van \
                    had stopped.",
        post_event: "The incident was discussed with the program manager and a seating plan change \
                     was proposed.",
    },
];

pub fn sample_incidents() -> &'static [SampleIncident] {
    SAMPLES
}

/// Looks up a scenario by its 1-based number.
pub fn sample_incident(scenario: usize) -> CaptureResult<&'static SampleIncident> {
    scenario
        .checked_sub(1)
        .and_then(|idx| SAMPLES.get(idx))
        .ok_or_else(|| {
            CaptureError::InvalidInput(format!(
                "sample scenario must be between 1 and {}",
                SAMPLES.len()
            ))
        })
}

impl SampleIncident {
    pub fn metadata(
        &self,
        reporter_name: NonEmptyText,
        now: DateTime<Utc>,
    ) -> CaptureResult<IncidentMetadata> {
        let text = |value: &str| {
            NonEmptyText::new(value).map_err(|e| CaptureError::InvalidInput(e.to_string()))
        };
        Ok(IncidentMetadata {
            reporter_name,
            participant_name: text(self.participant_name)?,
            event_date_time: now - Duration::hours(self.hours_ago),
            location: text(self.location)?,
        })
    }

    pub fn phases(&self) -> NarrativePhases {
        NarrativePhases {
            before_event: self.before_event.to_string(),
            during_event: self.during_event.to_string(),
            end_event: self.end_event.to_string(),
            post_event: self.post_event.to_string(),
        }
    }
}

/// A plausible answer long enough to count as complete.
pub fn mock_answer(phase: Phase, ordinal: u32) -> String {
    let detail = match phase {
        Phase::BeforeEvent => "the participant seemed settled and followed the usual routine",
        Phase::DuringEvent => "staff stayed nearby and spoke calmly throughout",
        Phase::EndEvent => "things returned to normal within about ten minutes",
        Phase::PostEvent => "the team leader was informed before the end of the shift",
    };
    format!("Mock answer {ordinal}: {detail}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationRules;
    use crate::validation::validate_narrative;

    #[test]
    fn test_every_sample_has_a_complete_narrative() {
        for sample in sample_incidents() {
            assert!(
                validate_narrative(&sample.phases(), &ValidationRules::default()).is_valid(),
                "{} narrative is too short",
                sample.participant_name
            );
        }
    }

    #[test]
    fn test_scenarios_are_one_based() {
        assert_eq!(sample_incident(1).unwrap().participant_name, "Jane Doe");
        assert!(sample_incident(0).is_err());
        assert!(sample_incident(SAMPLES.len() + 1).is_err());
    }

    #[test]
    fn test_mock_answers_count_as_complete() {
        for phase in Phase::ALL {
            assert!(ica_types::trimmed_char_count(&mock_answer(phase, 1)) > 10);
        }
    }
}
