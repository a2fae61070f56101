//! Capture session orchestrator.
//!
//! [`CaptureWorkflow`] drives one incident through the eight steps. It owns the state machine,
//! the narrative editor, one clarification session per phase and the review stage, and reloads a
//! [`CaptureSnapshot`] from the backend after every mutation so step validators always see
//! persisted data.
//!
//! Saving rules:
//! - `advance` flushes the current step's pending saves before validating it.
//! - `go_back` and `jump_to` cancel the pending saves of the step being left.
//! - The narrative is flushed before questions or an enhancement are generated.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::autosave::SaveStatus;
use crate::backend::{
    CompletionReport, ExportSection, GeneratedQuestions, IncidentBackend, PdfArtifact,
    PdfDownload, SubmissionReceipt,
};
use crate::clarification::ClarificationSession;
use crate::components::ids::{EnhancedNarrativeId, IncidentId, QuestionId};
use crate::components::incident::{Incident, IncidentMetadata};
use crate::components::narrative::Phase;
use crate::config::CoreConfig;
use crate::editor::NarrativeEditor;
use crate::error::{CaptureError, CaptureResult};
use crate::review::ReviewStage;
use crate::session::Session;
use crate::snapshot::CaptureSnapshot;
use crate::workflow::{StepId, Workflow};

/// Per-incident components, created once the incident exists.
struct IncidentParts {
    id: IncidentId,
    narrative: NarrativeEditor,
    clarifications: BTreeMap<Phase, ClarificationSession>,
    review: ReviewStage,
}

impl IncidentParts {
    fn new(
        id: IncidentId,
        snapshot: &CaptureSnapshot,
        backend: &Arc<dyn IncidentBackend>,
        cfg: &CoreConfig,
    ) -> Self {
        let clarifications = Phase::ALL
            .into_iter()
            .map(|phase| {
                let mut session = ClarificationSession::new(
                    id,
                    phase,
                    Arc::clone(backend),
                    cfg.answer_autosave_delay(),
                );
                session.sync(snapshot.questions_for(phase));
                (phase, session)
            })
            .collect();

        Self {
            id,
            narrative: NarrativeEditor::new(
                id,
                snapshot.narrative_phases(),
                Arc::clone(backend),
                cfg.narrative_autosave_delay(),
            ),
            clarifications,
            review: ReviewStage::new(id, Arc::clone(backend)),
        }
    }

    fn clarification(&self, phase: Phase) -> CaptureResult<&ClarificationSession> {
        self.clarifications
            .get(&phase)
            .ok_or_else(|| CaptureError::InvalidInput(format!("no session for {phase}")))
    }

    fn clarification_mut(&mut self, phase: Phase) -> CaptureResult<&mut ClarificationSession> {
        self.clarifications
            .get_mut(&phase)
            .ok_or_else(|| CaptureError::InvalidInput(format!("no session for {phase}")))
    }
}

pub struct CaptureWorkflow {
    cfg: Arc<CoreConfig>,
    backend: Arc<dyn IncidentBackend>,
    session: Session,
    workflow: Workflow,
    snapshot: CaptureSnapshot,
    /// Set as soon as the backend has created the incident, even if loading it then fails.
    created: Option<IncidentId>,
    parts: Option<IncidentParts>,
}

impl CaptureWorkflow {
    /// Starts a new capture with no incident yet.
    pub fn new(cfg: Arc<CoreConfig>, backend: Arc<dyn IncidentBackend>, session: Session) -> Self {
        Self {
            cfg,
            backend,
            session,
            workflow: Workflow::new(),
            snapshot: CaptureSnapshot::default(),
            created: None,
            parts: None,
        }
    }

    /// Continues an existing incident, reconstructing progress from persisted data.
    pub async fn resume(
        cfg: Arc<CoreConfig>,
        backend: Arc<dyn IncidentBackend>,
        session: Session,
        incident_id: IncidentId,
    ) -> CaptureResult<Self> {
        let snapshot = CaptureSnapshot::load(backend.as_ref(), incident_id).await?;
        let workflow = Workflow::resume(&snapshot, &cfg.rules());
        let parts = IncidentParts::new(incident_id, &snapshot, &backend, &cfg);
        tracing::info!(%incident_id, current = %workflow.current_step(), "resumed capture");

        Ok(Self {
            cfg,
            backend,
            session,
            workflow,
            snapshot,
            created: Some(incident_id),
            parts: Some(parts),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn current_step(&self) -> StepId {
        self.workflow.current_step()
    }

    pub fn snapshot(&self) -> &CaptureSnapshot {
        &self.snapshot
    }

    pub fn incident_id(&self) -> Option<IncidentId> {
        self.parts.as_ref().map(|p| p.id)
    }

    pub fn incident(&self) -> Option<&Incident> {
        self.snapshot.incident.as_ref()
    }

    pub fn narrative(&self) -> Option<&NarrativeEditor> {
        self.parts.as_ref().map(|p| &p.narrative)
    }

    pub fn clarification(&self, phase: Phase) -> Option<&ClarificationSession> {
        self.parts.as_ref().and_then(|p| p.clarifications.get(&phase))
    }

    /// Unsubmitted incidents of the signed-in reporter.
    pub async fn list_drafts(&self) -> CaptureResult<Vec<Incident>> {
        Ok(self
            .backend
            .list_incomplete_incidents(self.session.reporter_name().as_str())
            .await?)
    }

    /// Creates the incident from the metadata step and advances to the narrative.
    ///
    /// The incident id is fixed for the rest of the capture; a second call is refused. A retry
    /// after the incident was created but could not be loaded continues with that incident.
    pub async fn submit_metadata(&mut self, metadata: IncidentMetadata) -> CaptureResult<IncidentId> {
        if self.parts.is_some() {
            return Err(CaptureError::IncidentAlreadyCreated);
        }

        let id = match self.created {
            Some(id) => {
                tracing::debug!(incident_id = %id, "reusing incident created by an earlier attempt");
                id
            }
            None => {
                let id = self.backend.create_incident(metadata).await?;
                self.created = Some(id);
                id
            }
        };
        self.snapshot = CaptureSnapshot::load(self.backend.as_ref(), id).await?;
        self.parts = Some(IncidentParts::new(id, &self.snapshot, &self.backend, &self.cfg));
        tracing::info!(incident_id = %id, "incident created");

        self.workflow.advance(&self.snapshot, &self.cfg.rules())?;
        Ok(id)
    }

    pub fn edit_narrative(&mut self, phase: Phase, text: impl Into<String>) -> CaptureResult<()> {
        self.ensure_open()?;
        self.parts_mut()?.narrative.edit_phase(phase, text);
        Ok(())
    }

    pub fn narrative_status(&self) -> SaveStatus {
        self.parts
            .as_ref()
            .map_or(SaveStatus::Idle, |p| p.narrative.status())
    }

    /// Generates (or fetches cached) questions for `phase` from the persisted narrative text.
    pub async fn generate_questions(
        &mut self,
        phase: Phase,
        force_regenerate: bool,
    ) -> CaptureResult<GeneratedQuestions> {
        self.ensure_open()?;
        self.parts()?.narrative.flush().await?;
        self.refresh().await?;
        let content = self
            .snapshot
            .narrative_phases()
            .map(|phases| phases.get(phase).to_string())
            .unwrap_or_default();
        let generated = self
            .parts_mut()?
            .clarification_mut(phase)?
            .generate(&content, force_regenerate)
            .await?;
        self.refresh().await?;
        Ok(generated)
    }

    pub fn edit_answer(
        &mut self,
        phase: Phase,
        question_id: QuestionId,
        text: impl Into<String>,
    ) -> CaptureResult<()> {
        self.ensure_open()?;
        self.parts()?
            .clarification(phase)?
            .edit_answer(question_id, text)
    }

    /// Saves everything pending and generates a new enhanced narrative.
    pub async fn generate_enhancement(&mut self) -> CaptureResult<EnhancedNarrativeId> {
        self.ensure_open()?;
        let parts = self.parts_mut()?;
        parts.narrative.flush().await?;
        for session in parts.clarifications.values() {
            session.flush().await?;
        }
        let id = parts.id;

        let enhanced = self
            .backend
            .generate_enhancement(id)
            .await
            .map_err(CaptureError::generation)?;
        self.refresh().await?;
        Ok(enhanced)
    }

    /// Stores the reporter's own wording of the enhanced narrative.
    pub async fn edit_enhanced(&mut self, content: &str) -> CaptureResult<()> {
        self.ensure_open()?;
        let id = self.parts_mut()?.id;
        self.backend.update_enhanced_narrative(id, content).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Saves the current step, reloads persisted data and moves to the next step.
    pub async fn advance(&mut self) -> CaptureResult<StepId> {
        let step = self.workflow.current_step();
        self.flush_step(step).await?;
        self.refresh().await?;
        Ok(self.workflow.advance(&self.snapshot, &self.cfg.rules())?)
    }

    pub fn go_back(&mut self) -> CaptureResult<StepId> {
        let left = self.workflow.current_step();
        let step = self.workflow.go_back()?;
        self.cancel_step(left);
        Ok(step)
    }

    pub fn jump_to(&mut self, target: StepId) -> CaptureResult<StepId> {
        let left = self.workflow.current_step();
        let step = self.workflow.jump_to(target)?;
        if left != step {
            self.cancel_step(left);
        }
        Ok(step)
    }

    /// Reloads persisted data and clears completion of steps that no longer validate.
    pub async fn refresh(&mut self) -> CaptureResult<Vec<StepId>> {
        let Some(parts) = self.parts.as_mut() else {
            return Ok(Vec::new());
        };

        self.snapshot = CaptureSnapshot::load(self.backend.as_ref(), parts.id).await?;
        parts.narrative.sync(self.snapshot.narrative_phases());
        for (phase, session) in parts.clarifications.iter_mut() {
            session.sync(self.snapshot.questions_for(*phase));
        }
        Ok(self.workflow.reconcile(&self.snapshot, &self.cfg.rules()))
    }

    pub async fn completion(&self) -> CaptureResult<CompletionReport> {
        self.parts()?.review.refresh_checklist().await
    }

    /// Exports the chosen sections. Never changes the incident or the workflow.
    pub async fn export_pdf(
        &self,
        sections: &[ExportSection],
    ) -> CaptureResult<(PdfArtifact, PdfDownload)> {
        self.parts()?.review.export_pdf(sections).await
    }

    /// Submits the incident for analysis and completes the review step.
    pub async fn submit(&mut self) -> CaptureResult<SubmissionReceipt> {
        if self.workflow.is_submitted() {
            return Err(CaptureError::AlreadySubmitted);
        }
        self.flush_step(self.workflow.current_step()).await?;
        self.refresh().await?;

        let unfinished: Vec<String> = StepId::Review
            .dependencies()
            .iter()
            .filter(|dep| !self.workflow.is_completed(**dep))
            .map(|dep| format!("The \"{}\" step is not complete", dep.title()))
            .collect();
        if !unfinished.is_empty() {
            return Err(CaptureError::Incomplete {
                missing: unfinished,
            });
        }

        let enhanced_id = self.snapshot.enhanced.as_ref().map(|e| e.id);
        let receipt = self.parts()?.review.submit(enhanced_id).await?;
        self.workflow.mark_submitted()?;
        self.refresh().await?;
        Ok(receipt)
    }

    /// Fills the metadata and narrative from a canned sample incident.
    #[cfg(feature = "sample-data")]
    pub async fn apply_sample(&mut self, scenario: usize) -> CaptureResult<IncidentId> {
        use crate::session::Capability;

        self.session.require(Capability::SampleData)?;
        let sample = crate::sample::sample_incident(scenario)?;

        let id = match self.incident_id() {
            Some(id) => id,
            None => {
                let metadata =
                    sample.metadata(self.session.reporter_name().clone(), chrono::Utc::now())?;
                self.submit_metadata(metadata).await?
            }
        };

        let phases = sample.phases();
        for phase in Phase::ALL {
            self.edit_narrative(phase, phases.get(phase))?;
        }
        self.parts()?.narrative.flush().await?;
        self.refresh().await?;
        tracing::debug!(incident_id = %id, scenario, "applied sample incident");
        Ok(id)
    }

    /// Fills every unanswered question of `phase` with mock text. Returns how many were filled.
    #[cfg(feature = "sample-data")]
    pub fn fill_mock_answers(&mut self, phase: Phase) -> CaptureResult<usize> {
        use crate::session::Capability;

        self.session.require(Capability::MockAnswers)?;
        self.ensure_open()?;
        let session = self.parts()?.clarification(phase)?;

        let mut filled = 0;
        for question in session.questions() {
            let answered = session
                .answer_text(question.id)
                .is_some_and(|text| !text.trim().is_empty());
            if !answered {
                session.edit_answer(
                    question.id,
                    crate::sample::mock_answer(phase, question.ordinal),
                )?;
                filled += 1;
            }
        }
        Ok(filled)
    }

    async fn flush_step(&self, step: StepId) -> CaptureResult<()> {
        let Some(parts) = self.parts.as_ref() else {
            return Ok(());
        };
        match step {
            StepId::Narrative => parts.narrative.flush().await,
            StepId::Clarification(phase) => parts.clarification(phase)?.flush().await,
            _ => Ok(()),
        }
    }

    fn cancel_step(&mut self, step: StepId) {
        let Some(parts) = self.parts.as_mut() else {
            return;
        };
        match step {
            StepId::Narrative => {
                parts.narrative.cancel();
                parts.narrative.sync(self.snapshot.narrative_phases());
            }
            StepId::Clarification(phase) => {
                if let Some(session) = parts.clarifications.get(&phase) {
                    session.cancel_pending();
                }
            }
            _ => {}
        }
    }

    fn ensure_open(&self) -> CaptureResult<()> {
        if self.workflow.is_submitted() || self.snapshot.is_submitted() {
            return Err(CaptureError::AlreadySubmitted);
        }
        Ok(())
    }

    fn parts(&self) -> CaptureResult<&IncidentParts> {
        self.parts.as_ref().ok_or(CaptureError::NoIncident)
    }

    fn parts_mut(&mut self) -> CaptureResult<&mut IncidentParts> {
        self.parts.as_mut().ok_or(CaptureError::NoIncident)
    }
}
