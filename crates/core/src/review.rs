//! Review, export and submission.
//!
//! The completion checklist is computed from a [`CaptureSnapshot`] by [`evaluate_completion`],
//! which the in-memory backend also uses for its server-side gate, so client and server agree on
//! what "complete" means. [`ReviewStage`] wraps the backend calls of the final step and refuses
//! overlapping submissions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::{
    CompletionChecklist, CompletionReport, ExportSection, IncidentBackend, PdfArtifact,
    PdfDownload, SubmissionReceipt,
};
use crate::components::ids::{EnhancedNarrativeId, IncidentId};
use crate::components::narrative::Phase;
use crate::config::ValidationRules;
use crate::error::{CaptureError, CaptureResult};
use crate::snapshot::CaptureSnapshot;
use crate::validation::{validate, StepValidation};
use crate::workflow::StepId;

/// Computes the five checklist flags and the reasons for any that are unset.
pub fn evaluate_completion(snapshot: &CaptureSnapshot, rules: &ValidationRules) -> CompletionReport {
    let mut missing = Vec::new();
    let mut check = |step: StepId| match validate(step, snapshot, rules) {
        StepValidation::Valid => true,
        StepValidation::Invalid(reason) => {
            missing.push(reason);
            false
        }
    };

    let metadata_complete = check(StepId::Metadata);
    let narratives_complete = check(StepId::Narrative);
    let clarifications_complete = Phase::ALL
        .into_iter()
        .map(|phase| check(StepId::Clarification(phase)))
        .fold(true, |all, ok| all && ok);
    let enhancement_complete = check(StepId::Enhancement);

    let validation_passed = if snapshot.is_submitted() {
        missing.push("The incident has already been submitted".into());
        false
    } else {
        match (&snapshot.enhanced, &snapshot.narrative) {
            (Some(enhanced), Some(narrative))
                if enhanced.source_narrative_version != narrative.version =>
            {
                missing.push(
                    "The narrative changed after enhancement; regenerate the enhanced narrative"
                        .into(),
                );
                false
            }
            (Some(_), Some(_)) => true,
            _ => false,
        }
    };

    let checklist = CompletionChecklist {
        metadata_complete,
        narratives_complete,
        clarifications_complete,
        enhancement_complete,
        validation_passed,
    };
    CompletionReport {
        checklist,
        all_complete: checklist.all_complete(),
        missing_requirements: missing,
    }
}

/// Refuses overlapping or repeated submissions.
#[derive(Clone, Debug, Default)]
pub struct SubmissionGuard {
    busy: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard. Dropping the returned ticket releases it; a completed ticket also
    /// closes the guard for good.
    pub fn try_begin(&self) -> CaptureResult<SubmissionTicket> {
        if self.done.load(Ordering::Acquire) {
            return Err(CaptureError::AlreadySubmitted);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::SubmissionInProgress);
        }
        Ok(SubmissionTicket {
            guard: self.clone(),
        })
    }

    pub fn is_submitted(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn in_progress(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SubmissionTicket {
    guard: SubmissionGuard,
}

impl SubmissionTicket {
    /// Marks the submission as done; the guard refuses every later attempt.
    pub fn complete(self) {
        self.guard.done.store(true, Ordering::Release);
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Backend operations of the review step for one incident.
pub struct ReviewStage {
    incident_id: IncidentId,
    backend: Arc<dyn IncidentBackend>,
    guard: SubmissionGuard,
}

impl ReviewStage {
    pub fn new(incident_id: IncidentId, backend: Arc<dyn IncidentBackend>) -> Self {
        Self {
            incident_id,
            backend,
            guard: SubmissionGuard::new(),
        }
    }

    pub fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    pub async fn refresh_checklist(&self) -> CaptureResult<CompletionReport> {
        Ok(self
            .backend
            .validate_workflow_completion(self.incident_id)
            .await?)
    }

    /// Submits the incident for analysis.
    ///
    /// The completion report is fetched first; when it is not complete the submission is
    /// rejected here with the missing requirements and no submission request is sent.
    pub async fn submit(
        &self,
        enhanced_narrative_id: Option<EnhancedNarrativeId>,
    ) -> CaptureResult<SubmissionReceipt> {
        let ticket = self.guard.try_begin()?;

        let report = self.refresh_checklist().await?;
        if !report.all_complete {
            tracing::info!(
                incident_id = %self.incident_id,
                missing = report.missing_requirements.len(),
                "submission refused: workflow incomplete"
            );
            return Err(CaptureError::Incomplete {
                missing: report.missing_requirements,
            });
        }
        let Some(enhanced_narrative_id) = enhanced_narrative_id else {
            return Err(CaptureError::Incomplete {
                missing: vec!["The enhanced narrative has not been generated".into()],
            });
        };

        let receipt = self
            .backend
            .submit_for_analysis(self.incident_id, enhanced_narrative_id)
            .await
            .map_err(CaptureError::submission)?;
        ticket.complete();
        tracing::info!(
            incident_id = %self.incident_id,
            handoff_id = %receipt.handoff_id,
            "incident submitted for analysis"
        );
        Ok(receipt)
    }

    /// Generates an export document and resolves its download location.
    pub async fn export_pdf(
        &self,
        sections: &[ExportSection],
    ) -> CaptureResult<(PdfArtifact, PdfDownload)> {
        let artifact = self
            .backend
            .generate_pdf(self.incident_id, sections)
            .await?;
        let download = self.backend.download_pdf(&artifact.storage_ref).await?;
        Ok((artifact, download))
    }
}
