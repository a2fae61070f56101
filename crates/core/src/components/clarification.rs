//! Clarification questions and enhanced narratives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EnhancedNarrativeId, IncidentId, QuestionId};
use super::narrative::Phase;

/// A generated follow-up question tied to one narrative phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub id: QuestionId,
    pub incident_id: IncidentId,
    pub phase: Phase,

    /// 1-based position within the phase.
    pub ordinal: u32,

    pub question_text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// Set once a non-blank answer has been saved.
    pub answered: bool,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

/// A polished narrative combining the raw phases and the clarification answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedNarrative {
    pub id: EnhancedNarrativeId,
    pub incident_id: IncidentId,

    /// Incremented each time the enhancement is regenerated.
    pub version: u32,

    /// Narrative version this enhancement was generated from.
    pub source_narrative_version: u32,

    /// Generated text.
    pub content: String,

    pub user_edited: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_content: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnhancedNarrative {
    /// The text the reporter signs off on: their edit if present, otherwise the generated text.
    pub fn effective_text(&self) -> &str {
        match (&self.user_content, self.user_edited) {
            (Some(edited), true) => edited,
            _ => &self.content,
        }
    }
}
