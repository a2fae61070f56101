//! Point-in-time view of everything persisted for one incident.
//!
//! Step predicates never talk to the backend; they read a `CaptureSnapshot`. The workflow
//! reloads the snapshot after each mutation, which plays the part of the reactive query layer
//! pushing fresh state back into the form.

use std::collections::BTreeMap;

use crate::backend::IncidentBackend;
use crate::components::clarification::{ClarificationQuestion, EnhancedNarrative};
use crate::components::ids::IncidentId;
use crate::components::incident::Incident;
use crate::components::narrative::{Narrative, NarrativePhases, Phase};
use crate::error::BackendResult;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub incident: Option<Incident>,
    pub narrative: Option<Narrative>,
    /// Generated questions per phase; a phase is absent until questions exist for it.
    pub questions: BTreeMap<Phase, Vec<ClarificationQuestion>>,
    pub enhanced: Option<EnhancedNarrative>,
}

impl CaptureSnapshot {
    /// Loads the current persisted state of `incident_id` from the backend.
    pub async fn load(
        backend: &dyn IncidentBackend,
        incident_id: IncidentId,
    ) -> BackendResult<Self> {
        let incident = backend.get_incident(incident_id).await?;
        let narrative = backend.get_narrative(incident_id).await?;

        let mut questions = BTreeMap::new();
        for phase in Phase::ALL {
            let list = backend.list_questions(incident_id, phase).await?;
            if !list.is_empty() {
                questions.insert(phase, list);
            }
        }

        let enhanced = backend.get_enhanced_narrative(incident_id).await?;

        Ok(Self {
            incident: Some(incident),
            narrative,
            questions,
            enhanced,
        })
    }

    pub fn incident_id(&self) -> Option<IncidentId> {
        self.incident.as_ref().map(|i| i.id)
    }

    pub fn narrative_phases(&self) -> Option<&NarrativePhases> {
        self.narrative.as_ref().map(|n| &n.phases)
    }

    pub fn questions_for(&self, phase: Phase) -> &[ClarificationQuestion] {
        self.questions.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_submitted(&self) -> bool {
        self.incident.as_ref().is_some_and(Incident::is_submitted)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::components::ids::{EnhancedNarrativeId, QuestionId};
    use crate::components::incident::IncidentMetadata;
    use chrono::{Duration, Utc};
    use ica_types::NonEmptyText;

    pub(crate) fn metadata() -> IncidentMetadata {
        IncidentMetadata {
            reporter_name: NonEmptyText::new("Sam Carter").unwrap(),
            participant_name: NonEmptyText::new("Jane Doe").unwrap(),
            event_date_time: Utc::now() - Duration::hours(3),
            location: NonEmptyText::new("Hall A").unwrap(),
        }
    }

    /// A snapshot in which every step before review validates.
    pub(crate) fn complete_snapshot() -> CaptureSnapshot {
        let now = Utc::now();
        let id = IncidentId::new();
        let incident = Incident::from_metadata(id, metadata(), now);
        let phases = NarrativePhases {
            before_event: "x".repeat(60),
            ..NarrativePhases::default()
        };
        let questions = Phase::ALL
            .into_iter()
            .map(|phase| {
                let question = ClarificationQuestion {
                    id: QuestionId::new(),
                    incident_id: id,
                    phase,
                    ordinal: 1,
                    question_text: format!("What else happened {}?", phase.label()),
                    answer: None,
                    answered: false,
                    created_at: now,
                    answered_at: None,
                };
                (phase, vec![question])
            })
            .collect();

        CaptureSnapshot {
            incident: Some(incident),
            narrative: Some(Narrative {
                incident_id: id,
                phases,
                version: 1,
                updated_at: now,
            }),
            questions,
            enhanced: Some(EnhancedNarrative {
                id: EnhancedNarrativeId::new(),
                incident_id: id,
                version: 1,
                source_narrative_version: 1,
                content: "Enhanced account of the incident.".into(),
                user_edited: false,
                user_content: None,
                created_at: now,
                updated_at: now,
            }),
        }
    }
}
