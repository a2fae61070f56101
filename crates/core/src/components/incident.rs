//! Incident domain model.
//!
//! An incident is created when the metadata step is submitted and is then mutated by every later
//! step. It becomes terminal once it has been handed off for analysis.

use chrono::{DateTime, Utc};
use ica_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::IncidentId;

/// Metadata captured by the first workflow step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentMetadata {
    /// Name of the support worker reporting the incident.
    pub reporter_name: NonEmptyText,

    /// NDIS participant the incident concerns.
    pub participant_name: NonEmptyText,

    /// When the incident happened.
    pub event_date_time: DateTime<Utc>,

    /// Where the incident happened.
    pub location: NonEmptyText,
}

/// Progress of the capture workflow itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    /// Metadata saved, no narrative yet.
    Draft,
    /// At least one narrative save has happened.
    InProgress,
    /// Submitted for analysis.
    Completed,
}

/// Position of the incident in the wider reporting lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    CapturePending,
    AnalysisPending,
}

/// State of the handoff from capture to analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    NotStarted,
    Submitted,
}

macro_rules! status_display {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_display!(CaptureStatus {
    Draft => "draft",
    InProgress => "in_progress",
    Completed => "completed",
});
status_display!(OverallStatus {
    CapturePending => "capture_pending",
    AnalysisPending => "analysis_pending",
});
status_display!(HandoffStatus {
    NotStarted => "not_started",
    Submitted => "submitted",
});

/// A persisted incident record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub reporter_name: NonEmptyText,
    pub participant_name: NonEmptyText,
    pub event_date_time: DateTime<Utc>,
    pub location: NonEmptyText,
    pub capture_status: CaptureStatus,
    pub overall_status: OverallStatus,
    pub handoff_status: HandoffStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Builds a fresh draft incident from submitted metadata.
    pub fn from_metadata(id: IncidentId, metadata: IncidentMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id,
            reporter_name: metadata.reporter_name,
            participant_name: metadata.participant_name,
            event_date_time: metadata.event_date_time,
            location: metadata.location,
            capture_status: CaptureStatus::Draft,
            overall_status: OverallStatus::CapturePending,
            handoff_status: HandoffStatus::NotStarted,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.handoff_status == HandoffStatus::Submitted
    }
}
