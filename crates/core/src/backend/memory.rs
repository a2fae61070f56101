//! In-memory implementation of the backend collaborator.
//!
//! `MemoryBackend` implements the whole [`IncidentBackend`] surface against process memory. It
//! mirrors the hosted platform's observable behaviour: status transitions, question caching by
//! narrative fingerprint, the answer completeness threshold, the server-side submission gate and
//! side-effect-free document export.
//!
//! For developer tooling it can also inject one-shot failures per operation
//! ([`MemoryBackend::fail_next`]) and report how often each operation was called
//! ([`MemoryBackend::call_count`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ica_types::trimmed_char_count;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use super::generation::{
    AnsweredQuestion, NarrativeEnhancer, QuestionGenerator, TemplateEnhancer,
    TemplateQuestionGenerator,
};
use super::render::render_document;
use super::{
    AnswerReceipt, CompletionReport, ExportSection, GeneratedQuestions, IncidentBackend,
    PdfArtifact, PdfDownload, SubmissionReceipt,
};
use crate::components::clarification::{ClarificationQuestion, EnhancedNarrative};
use crate::components::ids::{EnhancedNarrativeId, HandoffId, IncidentId, QuestionId, StorageRef};
use crate::components::incident::{
    CaptureStatus, HandoffStatus, Incident, IncidentMetadata, OverallStatus,
};
use crate::components::narrative::{Narrative, NarrativePhases, Phase};
use crate::config::CoreConfig;
use crate::constants::{MAX_ANSWER_CHARS, MEMORY_DOCUMENT_URL_PREFIX};
use crate::error::{BackendError, BackendResult};
use crate::review::evaluate_completion;
use crate::snapshot::CaptureSnapshot;

/// Operations of the backend surface, used for fault injection and call counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateIncident,
    GetIncident,
    ListIncompleteIncidents,
    UpsertNarrative,
    GetNarrative,
    GenerateQuestions,
    ListQuestions,
    SubmitAnswer,
    GenerateEnhancement,
    GetEnhancedNarrative,
    UpdateEnhancedNarrative,
    ValidateCompletion,
    SubmitForAnalysis,
    GeneratePdf,
    DownloadPdf,
}

struct PhaseQuestions {
    fingerprint: String,
    questions: Vec<ClarificationQuestion>,
}

struct StoredDocument {
    filename: String,
    content: String,
}

#[derive(Default)]
struct Store {
    incidents: HashMap<IncidentId, Incident>,
    narratives: HashMap<IncidentId, Narrative>,
    questions: HashMap<(IncidentId, Phase), PhaseQuestions>,
    enhanced: HashMap<IncidentId, EnhancedNarrative>,
    documents: HashMap<StorageRef, StoredDocument>,
}

impl Store {
    fn incident(&self, id: IncidentId) -> BackendResult<&Incident> {
        self.incidents
            .get(&id)
            .ok_or_else(|| BackendError::NotFound(format!("incident {id}")))
    }

    /// Like [`Store::incident`], but refuses incidents that have been handed off.
    fn open_incident_mut(&mut self, id: IncidentId) -> BackendResult<&mut Incident> {
        let incident = self
            .incidents
            .get_mut(&id)
            .ok_or_else(|| BackendError::NotFound(format!("incident {id}")))?;
        if incident.is_submitted() {
            return Err(BackendError::Conflict(format!(
                "incident {id} has already been submitted"
            )));
        }
        Ok(incident)
    }

    fn snapshot(&self, id: IncidentId) -> BackendResult<CaptureSnapshot> {
        let incident = self.incident(id)?.clone();
        let questions = Phase::ALL
            .into_iter()
            .filter_map(|phase| {
                self.questions
                    .get(&(id, phase))
                    .filter(|entry| !entry.questions.is_empty())
                    .map(|entry| (phase, entry.questions.clone()))
            })
            .collect();

        Ok(CaptureSnapshot {
            incident: Some(incident),
            narrative: self.narratives.get(&id).cloned(),
            questions,
            enhanced: self.enhanced.get(&id).cloned(),
        })
    }
}

/// Fingerprint of the narrative content a question set was generated from.
fn narrative_fingerprint(phase: Phase, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phase.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(content.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// `incident-<first 8 id chars>-<timestamp>.pdf`
fn document_filename(incident_id: IncidentId, at: DateTime<Utc>) -> String {
    let prefix: String = incident_id.to_string().chars().take(8).collect();
    format!("incident-{prefix}-{}.pdf", at.format("%Y%m%dT%H%M%S"))
}

pub struct MemoryBackend {
    cfg: Arc<CoreConfig>,
    store: RwLock<Store>,
    generator: Arc<dyn QuestionGenerator>,
    enhancer: Arc<dyn NarrativeEnhancer>,
    faults: Mutex<HashMap<BackendOp, VecDeque<BackendError>>>,
    calls: Mutex<HashMap<BackendOp, usize>>,
}

impl MemoryBackend {
    /// Creates a backend using the template question generator and enhancer.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self::with_generators(
            cfg,
            Arc::new(TemplateQuestionGenerator),
            Arc::new(TemplateEnhancer),
        )
    }

    pub fn with_generators(
        cfg: Arc<CoreConfig>,
        generator: Arc<dyn QuestionGenerator>,
        enhancer: Arc<dyn NarrativeEnhancer>,
    ) -> Self {
        Self {
            cfg,
            store: RwLock::new(Store::default()),
            generator,
            enhancer,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Makes the next call of `op` fail with `error`. Multiple injections queue up.
    pub fn fail_next(&self, op: BackendOp, error: BackendError) {
        self.faults.lock().entry(op).or_default().push_back(error);
    }

    /// Number of times `op` has been called, including calls that failed.
    pub fn call_count(&self, op: BackendOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Raw content of a stored export document.
    pub fn document_content(&self, storage_ref: &StorageRef) -> Option<String> {
        self.store
            .read()
            .documents
            .get(storage_ref)
            .map(|doc| doc.content.clone())
    }

    fn enter(&self, op: BackendOp) -> BackendResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.faults.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => {
                tracing::debug!(?op, %error, "injected backend failure");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IncidentBackend for MemoryBackend {
    async fn create_incident(&self, metadata: IncidentMetadata) -> BackendResult<IncidentId> {
        self.enter(BackendOp::CreateIncident)?;
        let now = Utc::now();
        if metadata.event_date_time > now {
            return Err(BackendError::InvalidInput(
                "event_date_time cannot be in the future".into(),
            ));
        }

        let id = IncidentId::new();
        let incident = Incident::from_metadata(id, metadata, now);
        self.store.write().incidents.insert(id, incident);
        tracing::info!(incident_id = %id, "created incident");
        Ok(id)
    }

    async fn get_incident(&self, incident_id: IncidentId) -> BackendResult<Incident> {
        self.enter(BackendOp::GetIncident)?;
        self.store.read().incident(incident_id).cloned()
    }

    async fn list_incomplete_incidents(&self, reporter_name: &str) -> BackendResult<Vec<Incident>> {
        self.enter(BackendOp::ListIncompleteIncidents)?;
        let store = self.store.read();
        let mut incidents: Vec<Incident> = store
            .incidents
            .values()
            .filter(|i| i.reporter_name.as_str() == reporter_name && !i.is_submitted())
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(incidents)
    }

    async fn upsert_narrative(
        &self,
        incident_id: IncidentId,
        phases: NarrativePhases,
    ) -> BackendResult<()> {
        self.enter(BackendOp::UpsertNarrative)?;
        let now = Utc::now();
        let mut store = self.store.write();

        let incident = store.open_incident_mut(incident_id)?;
        if incident.capture_status == CaptureStatus::Draft {
            incident.capture_status = CaptureStatus::InProgress;
        }
        incident.updated_at = now;

        let version = store
            .narratives
            .get(&incident_id)
            .map_or(1, |n| n.version + 1);
        store.narratives.insert(
            incident_id,
            Narrative {
                incident_id,
                phases,
                version,
                updated_at: now,
            },
        );
        tracing::debug!(%incident_id, version, "saved narrative");
        Ok(())
    }

    async fn get_narrative(&self, incident_id: IncidentId) -> BackendResult<Option<Narrative>> {
        self.enter(BackendOp::GetNarrative)?;
        let store = self.store.read();
        store.incident(incident_id)?;
        Ok(store.narratives.get(&incident_id).cloned())
    }

    async fn generate_clarification_questions(
        &self,
        incident_id: IncidentId,
        phase: Phase,
        narrative_content: &str,
        force_regenerate: bool,
    ) -> BackendResult<GeneratedQuestions> {
        self.enter(BackendOp::GenerateQuestions)?;
        let mut store = self.store.write();
        store.open_incident_mut(incident_id)?;

        let fingerprint = narrative_fingerprint(phase, narrative_content);
        if !force_regenerate {
            if let Some(entry) = store.questions.get(&(incident_id, phase)) {
                if entry.fingerprint == fingerprint {
                    tracing::debug!(%incident_id, %phase, "returning cached questions");
                    return Ok(GeneratedQuestions {
                        questions: entry.questions.clone(),
                        cached: true,
                    });
                }
            }
        }

        let texts = self
            .generator
            .generate(phase, narrative_content)
            .map_err(BackendError::Generation)?;
        if texts.is_empty() {
            return Err(BackendError::Generation(format!(
                "no questions were generated for {}",
                phase.label()
            )));
        }

        let now = Utc::now();
        let questions: Vec<ClarificationQuestion> = texts
            .into_iter()
            .zip(1u32..)
            .map(|(question_text, ordinal)| ClarificationQuestion {
                id: QuestionId::new(),
                incident_id,
                phase,
                ordinal,
                question_text,
                answer: None,
                answered: false,
                created_at: now,
                answered_at: None,
            })
            .collect();

        store.questions.insert(
            (incident_id, phase),
            PhaseQuestions {
                fingerprint,
                questions: questions.clone(),
            },
        );
        tracing::info!(%incident_id, %phase, count = questions.len(), "generated questions");
        Ok(GeneratedQuestions {
            questions,
            cached: false,
        })
    }

    async fn list_questions(
        &self,
        incident_id: IncidentId,
        phase: Phase,
    ) -> BackendResult<Vec<ClarificationQuestion>> {
        self.enter(BackendOp::ListQuestions)?;
        let store = self.store.read();
        store.incident(incident_id)?;
        Ok(store
            .questions
            .get(&(incident_id, phase))
            .map(|entry| entry.questions.clone())
            .unwrap_or_default())
    }

    async fn submit_clarification_answer(
        &self,
        incident_id: IncidentId,
        question_id: QuestionId,
        phase: Phase,
        text: &str,
    ) -> BackendResult<AnswerReceipt> {
        self.enter(BackendOp::SubmitAnswer)?;
        let character_count = trimmed_char_count(text);
        if character_count > MAX_ANSWER_CHARS {
            return Err(BackendError::InvalidInput(format!(
                "answer exceeds {MAX_ANSWER_CHARS} characters"
            )));
        }

        let now = Utc::now();
        let mut store = self.store.write();
        store.open_incident_mut(incident_id)?.updated_at = now;

        let question = store
            .questions
            .get_mut(&(incident_id, phase))
            .and_then(|entry| entry.questions.iter_mut().find(|q| q.id == question_id))
            .ok_or_else(|| BackendError::NotFound(format!("question {question_id}")))?;

        question.answer = Some(text.to_string());
        question.answered = character_count > 0;
        question.answered_at = question.answered.then_some(now);

        Ok(AnswerReceipt {
            character_count,
            is_complete: character_count > self.cfg.rules().answer_complete_chars,
        })
    }

    async fn generate_enhancement(
        &self,
        incident_id: IncidentId,
    ) -> BackendResult<EnhancedNarrativeId> {
        self.enter(BackendOp::GenerateEnhancement)?;
        let now = Utc::now();
        let mut store = self.store.write();
        store.open_incident_mut(incident_id)?;

        let (content, source_narrative_version) = {
            let narrative = store.narratives.get(&incident_id).ok_or_else(|| {
                BackendError::Generation("no narrative has been saved".into())
            })?;

            let mut answered: Vec<&ClarificationQuestion> = Phase::ALL
                .iter()
                .filter_map(|phase| store.questions.get(&(incident_id, *phase)))
                .flat_map(|entry| entry.questions.iter())
                .collect();
            answered.sort_by_key(|q| (q.phase, q.ordinal));
            let answers: Vec<AnsweredQuestion<'_>> = answered
                .iter()
                .filter_map(|q| {
                    q.answer.as_deref().map(|answer| AnsweredQuestion {
                        phase: q.phase,
                        question: &q.question_text,
                        answer,
                    })
                })
                .collect();

            let content = self
                .enhancer
                .enhance(&narrative.phases, &answers)
                .map_err(BackendError::Generation)?;
            (content, narrative.version)
        };

        let version = store.enhanced.get(&incident_id).map_or(1, |e| e.version + 1);
        let id = EnhancedNarrativeId::new();
        store.enhanced.insert(
            incident_id,
            EnhancedNarrative {
                id,
                incident_id,
                version,
                source_narrative_version,
                content,
                user_edited: false,
                user_content: None,
                created_at: now,
                updated_at: now,
            },
        );
        tracing::info!(%incident_id, version, "generated enhanced narrative");
        Ok(id)
    }

    async fn get_enhanced_narrative(
        &self,
        incident_id: IncidentId,
    ) -> BackendResult<Option<EnhancedNarrative>> {
        self.enter(BackendOp::GetEnhancedNarrative)?;
        let store = self.store.read();
        store.incident(incident_id)?;
        Ok(store.enhanced.get(&incident_id).cloned())
    }

    async fn update_enhanced_narrative(
        &self,
        incident_id: IncidentId,
        user_content: &str,
    ) -> BackendResult<()> {
        self.enter(BackendOp::UpdateEnhancedNarrative)?;
        if user_content.trim().is_empty() {
            return Err(BackendError::InvalidInput(
                "enhanced narrative cannot be empty".into(),
            ));
        }

        let now = Utc::now();
        let mut store = self.store.write();
        store.open_incident_mut(incident_id)?;
        let enhanced = store.enhanced.get_mut(&incident_id).ok_or_else(|| {
            BackendError::NotFound(format!("enhanced narrative for incident {incident_id}"))
        })?;
        enhanced.user_content = Some(user_content.to_string());
        enhanced.user_edited = true;
        enhanced.updated_at = now;
        Ok(())
    }

    async fn validate_workflow_completion(
        &self,
        incident_id: IncidentId,
    ) -> BackendResult<CompletionReport> {
        self.enter(BackendOp::ValidateCompletion)?;
        let snapshot = self.store.read().snapshot(incident_id)?;
        Ok(evaluate_completion(&snapshot, &self.cfg.rules()))
    }

    async fn submit_for_analysis(
        &self,
        incident_id: IncidentId,
        enhanced_narrative_id: EnhancedNarrativeId,
    ) -> BackendResult<SubmissionReceipt> {
        self.enter(BackendOp::SubmitForAnalysis)?;
        let mut store = self.store.write();
        if store.incident(incident_id)?.is_submitted() {
            return Err(BackendError::Conflict(format!(
                "incident {incident_id} has already been submitted"
            )));
        }

        let report = evaluate_completion(&store.snapshot(incident_id)?, &self.cfg.rules());
        if !report.all_complete {
            return Err(BackendError::InvalidInput(format!(
                "workflow is incomplete: {}",
                report.missing_requirements.join("; ")
            )));
        }

        let current = store.enhanced.get(&incident_id).map(|e| e.id);
        if current != Some(enhanced_narrative_id) {
            return Err(BackendError::Conflict(format!(
                "enhanced narrative {enhanced_narrative_id} is not the current version"
            )));
        }

        let now = Utc::now();
        let incident = store.open_incident_mut(incident_id)?;
        incident.capture_status = CaptureStatus::Completed;
        incident.overall_status = OverallStatus::AnalysisPending;
        incident.handoff_status = HandoffStatus::Submitted;
        incident.updated_at = now;

        let handoff_id = HandoffId::new();
        tracing::info!(%incident_id, %handoff_id, "submitted incident for analysis");
        Ok(SubmissionReceipt {
            handoff_id,
            submitted_at: now,
        })
    }

    async fn generate_pdf(
        &self,
        incident_id: IncidentId,
        sections: &[ExportSection],
    ) -> BackendResult<PdfArtifact> {
        self.enter(BackendOp::GeneratePdf)?;
        if sections.is_empty() {
            return Err(BackendError::InvalidInput(
                "at least one export section is required".into(),
            ));
        }

        let mut store = self.store.write();
        let content = render_document(&store.snapshot(incident_id)?, sections);
        let now = Utc::now();
        let storage_ref = StorageRef::new(Uuid::new_v4().simple().to_string());
        let filename = document_filename(incident_id, now);

        store.documents.insert(
            storage_ref.clone(),
            StoredDocument {
                filename: filename.clone(),
                content,
            },
        );
        tracing::debug!(%incident_id, %storage_ref, "stored export document");
        Ok(PdfArtifact {
            storage_ref,
            filename,
        })
    }

    async fn download_pdf(&self, storage_ref: &StorageRef) -> BackendResult<PdfDownload> {
        self.enter(BackendOp::DownloadPdf)?;
        let store = self.store.read();
        let document = store
            .documents
            .get(storage_ref)
            .ok_or_else(|| BackendError::NotFound(format!("document {storage_ref}")))?;
        tracing::debug!(filename = %document.filename, "resolved document download");
        Ok(PdfDownload {
            url: format!("{MEMORY_DOCUMENT_URL_PREFIX}{storage_ref}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::metadata;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(Arc::new(CoreConfig::default()))
    }

    fn long_text() -> String {
        "Jane was waiting in Hall A for the bus and became distressed.".into()
    }

    #[test]
    fn test_document_filename_uses_id_prefix_and_timestamp() {
        let id = IncidentId::parse("0123456789abcdef0123456789abcdef").unwrap();
        let at = DateTime::parse_from_rfc3339("2026-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            document_filename(id, at),
            "incident-01234567-20260304T050607.pdf"
        );
    }

    async fn incident_with_narrative(backend: &MemoryBackend) -> IncidentId {
        let id = backend
            .create_incident(metadata())
            .await
            .expect("create_incident should succeed");
        backend
            .upsert_narrative(
                id,
                NarrativePhases {
                    before_event: long_text(),
                    ..NarrativePhases::default()
                },
            )
            .await
            .expect("upsert_narrative should succeed");
        id
    }

    #[tokio::test]
    async fn test_narrative_moves_incident_from_draft_to_in_progress() {
        let backend = backend();
        let id = backend.create_incident(metadata()).await.unwrap();
        let incident = backend.get_incident(id).await.unwrap();
        assert_eq!(incident.capture_status, CaptureStatus::Draft);
        assert_eq!(incident.participant_name.as_str(), "Jane Doe");

        backend
            .upsert_narrative(
                id,
                NarrativePhases {
                    before_event: "x".repeat(60),
                    ..NarrativePhases::default()
                },
            )
            .await
            .unwrap();
        let incident = backend.get_incident(id).await.unwrap();
        assert_eq!(incident.capture_status, CaptureStatus::InProgress);
        assert_eq!(backend.get_narrative(id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_future_event_time() {
        let backend = backend();
        let mut future = metadata();
        future.event_date_time = Utc::now() + chrono::Duration::days(2);
        assert!(matches!(
            backend.create_incident(future).await,
            Err(BackendError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_question_generation_is_cached_by_narrative_content() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;

        let first = backend
            .generate_clarification_questions(id, Phase::BeforeEvent, &long_text(), false)
            .await
            .unwrap();
        assert!(!first.cached);

        let second = backend
            .generate_clarification_questions(id, Phase::BeforeEvent, &long_text(), false)
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(first.questions, second.questions);

        let changed = backend
            .generate_clarification_questions(id, Phase::BeforeEvent, "Something else.", false)
            .await
            .unwrap();
        assert!(!changed.cached);

        let forced = backend
            .generate_clarification_questions(id, Phase::BeforeEvent, "Something else.", true)
            .await
            .unwrap();
        assert!(!forced.cached);
        assert_ne!(forced.questions[0].id, changed.questions[0].id);
    }

    #[tokio::test]
    async fn test_blank_phase_still_gets_questions() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        let generated = backend
            .generate_clarification_questions(id, Phase::PostEvent, "  ", false)
            .await
            .unwrap();
        assert_eq!(generated.questions.len(), crate::constants::QUESTIONS_PER_PHASE);
    }

    #[tokio::test]
    async fn test_enhancement_without_narrative_is_generation_error() {
        let backend = backend();
        let id = backend.create_incident(metadata()).await.unwrap();
        assert!(matches!(
            backend.generate_enhancement(id).await,
            Err(BackendError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_answer_completeness_threshold() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        let generated = backend
            .generate_clarification_questions(id, Phase::BeforeEvent, &long_text(), false)
            .await
            .unwrap();
        let question = &generated.questions[0];

        let short = backend
            .submit_clarification_answer(id, question.id, Phase::BeforeEvent, "12345")
            .await
            .unwrap();
        assert_eq!(short.character_count, 5);
        assert!(!short.is_complete);

        let long = backend
            .submit_clarification_answer(id, question.id, Phase::BeforeEvent, "123456789012345")
            .await
            .unwrap();
        assert_eq!(long.character_count, 15);
        assert!(long.is_complete);

        let stored = backend.list_questions(id, Phase::BeforeEvent).await.unwrap();
        assert_eq!(stored[0].answer.as_deref(), Some("123456789012345"));
        assert!(stored[0].answered);
    }

    #[tokio::test]
    async fn test_answer_for_wrong_phase_is_not_found() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        let generated = backend
            .generate_clarification_questions(id, Phase::BeforeEvent, &long_text(), false)
            .await
            .unwrap();
        let result = backend
            .submit_clarification_answer(
                id,
                generated.questions[0].id,
                Phase::DuringEvent,
                "An answer",
            )
            .await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submission_requires_complete_workflow() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        let enhanced = backend.generate_enhancement(id).await.unwrap();

        let report = backend.validate_workflow_completion(id).await.unwrap();
        assert!(!report.all_complete);
        assert!(!report.checklist.clarifications_complete);

        let result = backend.submit_for_analysis(id, enhanced).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
        let incident = backend.get_incident(id).await.unwrap();
        assert_eq!(incident.handoff_status, HandoffStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_full_submission_updates_statuses_once() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        for phase in Phase::ALL {
            backend
                .generate_clarification_questions(id, phase, &long_text(), false)
                .await
                .unwrap();
        }
        let enhanced = backend.generate_enhancement(id).await.unwrap();
        assert!(backend.validate_workflow_completion(id).await.unwrap().all_complete);

        backend.submit_for_analysis(id, enhanced).await.unwrap();
        let incident = backend.get_incident(id).await.unwrap();
        assert_eq!(incident.capture_status, CaptureStatus::Completed);
        assert_eq!(incident.overall_status, OverallStatus::AnalysisPending);
        assert_eq!(incident.handoff_status, HandoffStatus::Submitted);

        assert!(matches!(
            backend.submit_for_analysis(id, enhanced).await,
            Err(BackendError::Conflict(_))
        ));
        assert!(matches!(
            backend.upsert_narrative(id, NarrativePhases::default()).await,
            Err(BackendError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_enhancement_becomes_stale_after_narrative_edit() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        backend.generate_enhancement(id).await.unwrap();
        assert!(backend.validate_workflow_completion(id).await.unwrap().checklist.enhancement_complete);

        backend
            .upsert_narrative(
                id,
                NarrativePhases {
                    during_event: long_text(),
                    ..NarrativePhases::default()
                },
            )
            .await
            .unwrap();
        let report = backend.validate_workflow_completion(id).await.unwrap();
        assert!(!report.checklist.validation_passed);
    }

    #[tokio::test]
    async fn test_pdf_export_is_repeatable_and_does_not_touch_incident() {
        let backend = backend();
        let id = incident_with_narrative(&backend).await;
        let before = backend.get_incident(id).await.unwrap();

        let first = backend.generate_pdf(id, &ExportSection::ALL).await.unwrap();
        let second = backend.generate_pdf(id, &ExportSection::ALL).await.unwrap();
        assert_ne!(first.storage_ref, second.storage_ref);
        let expected_prefix = format!("incident-{}-", &id.to_string()[..8]);
        assert!(first.filename.starts_with(&expected_prefix));
        assert!(first.filename.ends_with(".pdf"));

        let download = backend.download_pdf(&first.storage_ref).await.unwrap();
        assert!(download.url.starts_with(MEMORY_DOCUMENT_URL_PREFIX));
        let content = backend.document_content(&first.storage_ref).unwrap();
        assert!(content.contains("Participant: Jane Doe"));

        assert_eq!(backend.get_incident(id).await.unwrap(), before);
        assert!(backend.generate_pdf(id, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures_are_one_shot_and_counted() {
        let backend = backend();
        backend.fail_next(
            BackendOp::CreateIncident,
            BackendError::Unavailable("maintenance".into()),
        );
        assert!(backend.create_incident(metadata()).await.is_err());
        assert!(backend.create_incident(metadata()).await.is_ok());
        assert_eq!(backend.call_count(BackendOp::CreateIncident), 2);
        assert_eq!(backend.call_count(BackendOp::SubmitForAnalysis), 0);
    }

    #[tokio::test]
    async fn test_list_incomplete_incidents_filters_by_reporter_and_status() {
        let backend = backend();
        let first = backend.create_incident(metadata()).await.unwrap();
        let mut other = metadata();
        other.reporter_name = ica_types::NonEmptyText::new("Someone Else").unwrap();
        backend.create_incident(other).await.unwrap();

        let listed = backend.list_incomplete_incidents("Sam Carter").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first);
    }
}
