//! Narrative domain model.
//!
//! A narrative is free text split into four fixed phases of the event. The core crate treats
//! each phase as opaque text; only trimmed character counts are ever inspected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::IncidentId;
use crate::error::BackendError;

/// One of the four narrative segments of an incident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BeforeEvent,
    DuringEvent,
    EndEvent,
    PostEvent,
}

impl Phase {
    /// All phases, in narrative order.
    pub const ALL: [Phase; 4] = [
        Phase::BeforeEvent,
        Phase::DuringEvent,
        Phase::EndEvent,
        Phase::PostEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforeEvent => "before_event",
            Phase::DuringEvent => "during_event",
            Phase::EndEvent => "end_event",
            Phase::PostEvent => "post_event",
        }
    }

    /// Human-friendly heading used in step titles and exported documents.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::BeforeEvent => "Before the event",
            Phase::DuringEvent => "During the event",
            Phase::EndEvent => "End of the event",
            Phase::PostEvent => "After the event",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| BackendError::InvalidInput(format!("unknown phase: {s}")))
    }
}

/// The four phase texts as captured by the reporter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativePhases {
    #[serde(default)]
    pub before_event: String,
    #[serde(default)]
    pub during_event: String,
    #[serde(default)]
    pub end_event: String,
    #[serde(default)]
    pub post_event: String,
}

impl NarrativePhases {
    pub fn get(&self, phase: Phase) -> &str {
        match phase {
            Phase::BeforeEvent => &self.before_event,
            Phase::DuringEvent => &self.during_event,
            Phase::EndEvent => &self.end_event,
            Phase::PostEvent => &self.post_event,
        }
    }

    pub fn set(&mut self, phase: Phase, text: impl Into<String>) {
        let slot = match phase {
            Phase::BeforeEvent => &mut self.before_event,
            Phase::DuringEvent => &mut self.during_event,
            Phase::EndEvent => &mut self.end_event,
            Phase::PostEvent => &mut self.post_event,
        };
        *slot = text.into();
    }

    /// True when every phase is blank after trimming.
    pub fn is_blank(&self) -> bool {
        Phase::ALL.iter().all(|p| self.get(*p).trim().is_empty())
    }
}

/// A persisted narrative record (one per incident).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub incident_id: IncidentId,

    #[serde(flatten)]
    pub phases: NarrativePhases,

    /// Incremented by every upsert, starting at 1.
    pub version: u32,

    pub updated_at: DateTime<Utc>,
}
