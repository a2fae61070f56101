//! # ICA Core
//!
//! Core logic of the incident capture workflow.
//!
//! This crate contains the workflow itself and nothing that serves it:
//! - The eight-step state machine with dependency checks ([`workflow`])
//! - One pure validator per step ([`validation`])
//! - Keyed debounced auto-save ([`autosave`])
//! - The per-phase clarification sub-flow and the narrative editor
//! - The review checklist, submission guard and document export ([`review`])
//! - [`CaptureWorkflow`], which ties these together for one incident
//!
//! Persistence is delegated to an [`IncidentBackend`]. The [`backend::memory::MemoryBackend`]
//! implements it in memory for tests, the CLI and the development server.
//!
//! **No API concerns**: HTTP routing and process setup belong in `api-rest` and the binaries.

pub mod autosave;
pub mod backend;
pub mod capture;
pub mod clarification;
pub mod components;
pub mod config;
pub mod constants;
pub mod editor;
pub mod error;
pub mod review;
#[cfg(feature = "sample-data")]
pub mod sample;
pub mod session;
pub mod snapshot;
pub mod validation;
pub mod workflow;

pub use autosave::{AutoSaver, SaveSink, SaveStatus};
pub use backend::memory::{BackendOp, MemoryBackend};
pub use backend::{
    AnswerReceipt, CompletionChecklist, CompletionReport, ExportSection, GeneratedQuestions,
    IncidentBackend, PdfArtifact, PdfDownload, SubmissionReceipt,
};
pub use capture::CaptureWorkflow;
pub use clarification::{ClarificationSession, GenerationState};
pub use components::clarification::{ClarificationQuestion, EnhancedNarrative};
pub use components::ids::{EnhancedNarrativeId, HandoffId, IncidentId, QuestionId, StorageRef};
pub use components::incident::{
    CaptureStatus, HandoffStatus, Incident, IncidentMetadata, OverallStatus,
};
pub use components::narrative::{Narrative, NarrativePhases, Phase};
pub use config::{CoreConfig, ValidationRules};
pub use editor::NarrativeEditor;
pub use error::{
    AutoSaveError, BackendError, BackendResult, CaptureError, CaptureResult, ErrorKind,
    NavigationError,
};
pub use review::{evaluate_completion, ReviewStage, SubmissionGuard};
pub use session::{Capabilities, Capability, Role, Session};
pub use snapshot::CaptureSnapshot;
pub use validation::{validate, StepValidation};
pub use workflow::{StepId, Workflow, WorkflowStep};

pub use ica_types::{NonEmptyText, TextError};
