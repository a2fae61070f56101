//! Backend collaborator surface.
//!
//! The capture workflow never stores anything itself. Every read and mutation goes through an
//! [`IncidentBackend`], which in production is the hosted database/function platform and in
//! tests, the CLI and the development server is the [`memory::MemoryBackend`].

pub mod generation;
pub mod memory;
pub mod render;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::components::clarification::{ClarificationQuestion, EnhancedNarrative};
use crate::components::ids::{EnhancedNarrativeId, HandoffId, IncidentId, QuestionId, StorageRef};
use crate::components::incident::{Incident, IncidentMetadata};
use crate::components::narrative::{Narrative, NarrativePhases, Phase};
use crate::error::{BackendError, BackendResult};

/// Result of a question generation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestions {
    pub questions: Vec<ClarificationQuestion>,
    /// True when the questions were returned from cache rather than regenerated.
    pub cached: bool,
}

/// Result of saving one clarification answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReceipt {
    /// Trimmed character count of the saved answer.
    pub character_count: usize,
    pub is_complete: bool,
}

/// The five completion flags shown on the review step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChecklist {
    pub metadata_complete: bool,
    pub narratives_complete: bool,
    pub clarifications_complete: bool,
    pub enhancement_complete: bool,
    pub validation_passed: bool,
}

impl CompletionChecklist {
    pub fn all_complete(&self) -> bool {
        self.metadata_complete
            && self.narratives_complete
            && self.clarifications_complete
            && self.enhancement_complete
            && self.validation_passed
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub checklist: CompletionChecklist,
    pub all_complete: bool,
    pub missing_requirements: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub handoff_id: HandoffId,
    pub submitted_at: DateTime<Utc>,
}

/// Part of an incident that can be included in an exported document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportSection {
    Metadata,
    Narrative,
    Clarifications,
    EnhancedNarrative,
}

impl ExportSection {
    pub const ALL: [ExportSection; 4] = [
        ExportSection::Metadata,
        ExportSection::Narrative,
        ExportSection::Clarifications,
        ExportSection::EnhancedNarrative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportSection::Metadata => "metadata",
            ExportSection::Narrative => "narrative",
            ExportSection::Clarifications => "clarifications",
            ExportSection::EnhancedNarrative => "enhanced_narrative",
        }
    }
}

impl fmt::Display for ExportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportSection {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportSection::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| BackendError::InvalidInput(format!("unknown export section: {s}")))
    }
}

/// A generated export document held by the backend's file storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfArtifact {
    pub storage_ref: StorageRef,
    pub filename: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfDownload {
    pub url: String,
}

/// Operations the capture workflow needs from the hosted platform.
#[async_trait]
pub trait IncidentBackend: Send + Sync {
    /// Creates a draft incident and returns its identity.
    async fn create_incident(&self, metadata: IncidentMetadata) -> BackendResult<IncidentId>;

    async fn get_incident(&self, incident_id: IncidentId) -> BackendResult<Incident>;

    /// Incidents of `reporter_name` that have not been submitted, most recently updated first.
    async fn list_incomplete_incidents(&self, reporter_name: &str) -> BackendResult<Vec<Incident>>;

    /// Replaces the four phase texts; moves a draft incident to in progress.
    async fn upsert_narrative(
        &self,
        incident_id: IncidentId,
        phases: NarrativePhases,
    ) -> BackendResult<()>;

    async fn get_narrative(&self, incident_id: IncidentId) -> BackendResult<Option<Narrative>>;

    /// Generates (or returns cached) clarification questions for one phase.
    async fn generate_clarification_questions(
        &self,
        incident_id: IncidentId,
        phase: Phase,
        narrative_content: &str,
        force_regenerate: bool,
    ) -> BackendResult<GeneratedQuestions>;

    async fn list_questions(
        &self,
        incident_id: IncidentId,
        phase: Phase,
    ) -> BackendResult<Vec<ClarificationQuestion>>;

    async fn submit_clarification_answer(
        &self,
        incident_id: IncidentId,
        question_id: QuestionId,
        phase: Phase,
        text: &str,
    ) -> BackendResult<AnswerReceipt>;

    /// Generates a new enhanced narrative from the narrative and answers.
    async fn generate_enhancement(
        &self,
        incident_id: IncidentId,
    ) -> BackendResult<EnhancedNarrativeId>;

    async fn get_enhanced_narrative(
        &self,
        incident_id: IncidentId,
    ) -> BackendResult<Option<EnhancedNarrative>>;

    /// Stores the reporter's edit of the enhanced narrative.
    async fn update_enhanced_narrative(
        &self,
        incident_id: IncidentId,
        user_content: &str,
    ) -> BackendResult<()>;

    async fn validate_workflow_completion(
        &self,
        incident_id: IncidentId,
    ) -> BackendResult<CompletionReport>;

    /// Hands the incident off to the analysis workflow.
    async fn submit_for_analysis(
        &self,
        incident_id: IncidentId,
        enhanced_narrative_id: EnhancedNarrativeId,
    ) -> BackendResult<SubmissionReceipt>;

    /// Renders the requested sections into a stored document. Never mutates the incident.
    async fn generate_pdf(
        &self,
        incident_id: IncidentId,
        sections: &[ExportSection],
    ) -> BackendResult<PdfArtifact>;

    async fn download_pdf(&self, storage_ref: &StorageRef) -> BackendResult<PdfDownload>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checklist_requires_all_five_flags() {
        let mut checklist = CompletionChecklist {
            metadata_complete: true,
            narratives_complete: true,
            clarifications_complete: true,
            enhancement_complete: true,
            validation_passed: true,
        };
        assert!(checklist.all_complete());
        checklist.clarifications_complete = false;
        assert!(!checklist.all_complete());
    }

    #[test]
    fn test_export_section_parsing() {
        assert_eq!(
            "enhanced_narrative".parse::<ExportSection>().unwrap(),
            ExportSection::EnhancedNarrative
        );
        assert!("appendix".parse::<ExportSection>().is_err());
    }
}
