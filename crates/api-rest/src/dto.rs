//! Request and response bodies of the REST API.
//!
//! Identifiers and timestamps travel as strings: ids in their canonical 32-character hex form,
//! timestamps as RFC 3339.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ica_core::{
    AnswerReceipt, ClarificationQuestion, CompletionReport, EnhancedNarrative, Incident,
    NarrativePhases, PdfArtifact, PdfDownload, SubmissionReceipt,
};

fn timestamp(value: &chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateIncidentReq {
    pub reporter_name: String,
    pub participant_name: String,
    /// RFC 3339 timestamp; must not be in the future.
    pub event_date_time: String,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateIncidentRes {
    pub incident_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentRes {
    pub id: String,
    pub reporter_name: String,
    pub participant_name: String,
    pub event_date_time: String,
    pub location: String,
    pub capture_status: String,
    pub overall_status: String,
    pub handoff_status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Incident> for IncidentRes {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id.to_string(),
            reporter_name: incident.reporter_name.to_string(),
            participant_name: incident.participant_name.to_string(),
            event_date_time: timestamp(&incident.event_date_time),
            location: incident.location.to_string(),
            capture_status: incident.capture_status.to_string(),
            overall_status: incident.overall_status.to_string(),
            handoff_status: incident.handoff_status.to_string(),
            created_at: timestamp(&incident.created_at),
            updated_at: timestamp(&incident.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListIncidentsRes {
    pub incidents: Vec<IncidentRes>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpsertNarrativeReq {
    #[serde(default)]
    pub before_event: String,
    #[serde(default)]
    pub during_event: String,
    #[serde(default)]
    pub end_event: String,
    #[serde(default)]
    pub post_event: String,
}

impl From<UpsertNarrativeReq> for NarrativePhases {
    fn from(req: UpsertNarrativeReq) -> Self {
        NarrativePhases {
            before_event: req.before_event,
            during_event: req.during_event,
            end_event: req.end_event,
            post_event: req.post_event,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpsertNarrativeRes {
    pub version: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateQuestionsReq {
    pub narrative_content: String,
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionRes {
    pub id: String,
    pub phase: String,
    pub ordinal: u32,
    pub question_text: String,
    pub answer: Option<String>,
    pub answered: bool,
}

impl From<&ClarificationQuestion> for QuestionRes {
    fn from(q: &ClarificationQuestion) -> Self {
        Self {
            id: q.id.to_string(),
            phase: q.phase.to_string(),
            ordinal: q.ordinal,
            question_text: q.question_text.clone(),
            answer: q.answer.clone(),
            answered: q.answered,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionsRes {
    pub questions: Vec<QuestionRes>,
    pub cached: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitAnswerReq {
    pub phase: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnswerRes {
    pub character_count: usize,
    pub is_complete: bool,
}

impl From<AnswerReceipt> for AnswerRes {
    fn from(receipt: AnswerReceipt) -> Self {
        Self {
            character_count: receipt.character_count,
            is_complete: receipt.is_complete,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnhancementRes {
    pub enhanced_narrative_id: String,
    pub version: u32,
    pub content: String,
    pub user_edited: bool,
    pub effective_text: String,
}

impl From<&EnhancedNarrative> for EnhancementRes {
    fn from(e: &EnhancedNarrative) -> Self {
        Self {
            enhanced_narrative_id: e.id.to_string(),
            version: e.version,
            content: e.content.clone(),
            user_edited: e.user_edited,
            effective_text: e.effective_text().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateEnhancementReq {
    pub user_content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionRes {
    pub metadata_complete: bool,
    pub narratives_complete: bool,
    pub clarifications_complete: bool,
    pub enhancement_complete: bool,
    pub validation_passed: bool,
    pub all_complete: bool,
    pub missing_requirements: Vec<String>,
}

impl From<CompletionReport> for CompletionRes {
    fn from(report: CompletionReport) -> Self {
        let c = report.checklist;
        Self {
            metadata_complete: c.metadata_complete,
            narratives_complete: c.narratives_complete,
            clarifications_complete: c.clarifications_complete,
            enhancement_complete: c.enhancement_complete,
            validation_passed: c.validation_passed,
            all_complete: report.all_complete,
            missing_requirements: report.missing_requirements,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitReq {
    pub enhanced_narrative_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRes {
    pub handoff_id: String,
    pub submitted_at: String,
}

impl From<SubmissionReceipt> for SubmitRes {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            handoff_id: receipt.handoff_id.to_string(),
            submitted_at: timestamp(&receipt.submitted_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GeneratePdfReq {
    /// Any of `metadata`, `narrative`, `clarifications`, `enhanced_narrative`.
    pub sections: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PdfRes {
    pub storage_ref: String,
    pub filename: String,
}

impl From<PdfArtifact> for PdfRes {
    fn from(artifact: PdfArtifact) -> Self {
        Self {
            storage_ref: artifact.storage_ref.to_string(),
            filename: artifact.filename,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PdfDownloadRes {
    pub url: String,
}

impl From<PdfDownload> for PdfDownloadRes {
    fn from(download: PdfDownload) -> Self {
        Self { url: download.url }
    }
}
