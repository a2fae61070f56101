//! Clarification sub-flow for one narrative phase.
//!
//! A [`ClarificationSession`] is the same component for all four phases, parameterised by
//! [`Phase`]. It generates (or fetches cached) questions and auto-saves answers keyed by question
//! id, keeping the receipt of the last save per question.

use async_trait::async_trait;
use ica_types::trimmed_char_count;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::autosave::{AutoSaver, SaveSink, SaveStatus};
use crate::backend::{AnswerReceipt, GeneratedQuestions, IncidentBackend};
use crate::components::clarification::ClarificationQuestion;
use crate::components::ids::{IncidentId, QuestionId};
use crate::components::narrative::Phase;
use crate::constants::MAX_ANSWER_CHARS;
use crate::error::{BackendError, CaptureError, CaptureResult};

type Receipts = Arc<Mutex<HashMap<QuestionId, AnswerReceipt>>>;

struct AnswerSink {
    incident_id: IncidentId,
    phase: Phase,
    backend: Arc<dyn IncidentBackend>,
    receipts: Receipts,
}

#[async_trait]
impl SaveSink<QuestionId, String> for AnswerSink {
    async fn persist(&self, key: &QuestionId, value: String) -> Result<(), BackendError> {
        let receipt = self
            .backend
            .submit_clarification_answer(self.incident_id, *key, self.phase, &value)
            .await?;
        self.receipts.lock().insert(*key, receipt);
        Ok(())
    }
}

/// Outcome of the latest generation attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationState {
    NotRequested,
    Ready { cached: bool },
    Failed(String),
}

pub struct ClarificationSession {
    incident_id: IncidentId,
    phase: Phase,
    backend: Arc<dyn IncidentBackend>,
    questions: Vec<ClarificationQuestion>,
    generation: GenerationState,
    saver: AutoSaver<QuestionId, String>,
    receipts: Receipts,
}

impl ClarificationSession {
    pub fn new(
        incident_id: IncidentId,
        phase: Phase,
        backend: Arc<dyn IncidentBackend>,
        delay: Duration,
    ) -> Self {
        let receipts = Receipts::default();
        let sink = AnswerSink {
            incident_id,
            phase,
            backend: Arc::clone(&backend),
            receipts: Arc::clone(&receipts),
        };
        Self {
            incident_id,
            phase,
            backend,
            questions: Vec::new(),
            generation: GenerationState::NotRequested,
            saver: AutoSaver::new(delay, Arc::new(sink)),
            receipts,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn questions(&self) -> &[ClarificationQuestion] {
        &self.questions
    }

    pub fn generation_state(&self) -> &GenerationState {
        &self.generation
    }

    /// Requests questions for `narrative_content`.
    ///
    /// A freshly generated set replaces the previous questions, so unsaved answers to the old
    /// questions are dropped. Generation failures leave the current questions untouched.
    pub async fn generate(
        &mut self,
        narrative_content: &str,
        force_regenerate: bool,
    ) -> CaptureResult<GeneratedQuestions> {
        let result = self
            .backend
            .generate_clarification_questions(
                self.incident_id,
                self.phase,
                narrative_content,
                force_regenerate,
            )
            .await;

        let generated = match result {
            Ok(generated) => generated,
            Err(err) => {
                tracing::warn!(phase = %self.phase, error = %err, "question generation failed");
                self.generation = GenerationState::Failed(err.to_string());
                return Err(CaptureError::generation(err));
            }
        };

        self.generation = GenerationState::Ready {
            cached: generated.cached,
        };
        self.sync(&generated.questions);
        Ok(generated)
    }

    /// Adopts a persisted question list; a different set of questions discards unsaved answers.
    pub fn sync(&mut self, questions: &[ClarificationQuestion]) {
        let same_set = self.questions.len() == questions.len()
            && self
                .questions
                .iter()
                .zip(questions)
                .all(|(a, b)| a.id == b.id);
        if !same_set {
            self.saver.cancel_all();
            self.receipts.lock().clear();
        }
        self.questions = questions.to_vec();
    }

    /// Records an edit to one answer and schedules its save.
    pub fn edit_answer(&self, question_id: QuestionId, text: impl Into<String>) -> CaptureResult<()> {
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(CaptureError::InvalidInput(format!(
                "question {question_id} does not belong to {}",
                self.phase.label()
            )));
        }
        let text = text.into();
        if trimmed_char_count(&text) > MAX_ANSWER_CHARS {
            return Err(CaptureError::InvalidInput(format!(
                "answers are limited to {MAX_ANSWER_CHARS} characters"
            )));
        }
        self.saver.edit(question_id, text);
        Ok(())
    }

    /// The answer as the reporter currently sees it: unsaved text first, then the saved answer.
    pub fn answer_text(&self, question_id: QuestionId) -> Option<String> {
        self.saver.pending_value(&question_id).or_else(|| {
            self.questions
                .iter()
                .find(|q| q.id == question_id)
                .and_then(|q| q.answer.clone())
        })
    }

    pub fn save_status(&self, question_id: QuestionId) -> SaveStatus {
        self.saver.status(&question_id)
    }

    /// Receipt of the last successful save of `question_id` in this session.
    pub fn receipt(&self, question_id: QuestionId) -> Option<AnswerReceipt> {
        self.receipts.lock().get(&question_id).copied()
    }

    pub fn has_pending(&self) -> bool {
        self.saver.has_pending()
    }

    /// Saves every pending answer now.
    pub async fn flush(&self) -> CaptureResult<()> {
        Ok(self.saver.flush_all().await?)
    }

    pub fn cancel_pending(&self) {
        self.saver.cancel_all();
    }
}
