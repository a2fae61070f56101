//! Narrative editor with debounced persistence.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::autosave::{AutoSaver, SaveSink, SaveStatus};
use crate::backend::IncidentBackend;
use crate::components::ids::IncidentId;
use crate::components::narrative::{NarrativePhases, Phase};
use crate::error::{BackendError, CaptureResult};

struct NarrativeSink {
    backend: Arc<dyn IncidentBackend>,
}

#[async_trait]
impl SaveSink<IncidentId, NarrativePhases> for NarrativeSink {
    async fn persist(&self, key: &IncidentId, value: NarrativePhases) -> Result<(), BackendError> {
        self.backend.upsert_narrative(*key, value).await
    }
}

/// Holds the four phase texts being edited and saves them as one record.
///
/// All four phases share a single auto-save key (the incident), so an edit to any phase
/// restarts the same timer and the whole narrative is upserted together.
pub struct NarrativeEditor {
    incident_id: IncidentId,
    phases: NarrativePhases,
    saver: AutoSaver<IncidentId, NarrativePhases>,
}

impl NarrativeEditor {
    pub fn new(
        incident_id: IncidentId,
        saved: Option<&NarrativePhases>,
        backend: Arc<dyn IncidentBackend>,
        delay: Duration,
    ) -> Self {
        Self {
            incident_id,
            phases: saved.cloned().unwrap_or_default(),
            saver: AutoSaver::new(delay, Arc::new(NarrativeSink { backend })),
        }
    }

    pub fn edit_phase(&mut self, phase: Phase, text: impl Into<String>) {
        self.phases.set(phase, text);
        self.saver.edit(self.incident_id, self.phases.clone());
    }

    pub fn phases(&self) -> &NarrativePhases {
        &self.phases
    }

    pub fn text(&self, phase: Phase) -> &str {
        self.phases.get(phase)
    }

    pub fn status(&self) -> SaveStatus {
        self.saver.status(&self.incident_id)
    }

    pub fn has_pending(&self) -> bool {
        self.saver.has_pending()
    }

    /// Persists unsaved edits now.
    pub async fn flush(&self) -> CaptureResult<()> {
        Ok(self.saver.flush(&self.incident_id).await?)
    }

    /// Discards unsaved edits; the next sync restores the saved text.
    pub fn cancel(&self) {
        self.saver.cancel(&self.incident_id);
    }

    /// Adopts the persisted phases unless local edits are still waiting to be saved.
    pub fn sync(&mut self, saved: Option<&NarrativePhases>) {
        if !self.saver.has_pending() {
            self.phases = saved.cloned().unwrap_or_default();
        }
    }
}
