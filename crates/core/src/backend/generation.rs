//! Question generation and narrative enhancement.
//!
//! The hosted platform calls a language model for both. The in-memory backend plugs in the
//! deterministic template implementations below so the workflow can be exercised offline.

use crate::components::narrative::{NarrativePhases, Phase};
use crate::constants::QUESTIONS_PER_PHASE;

/// Produces follow-up questions for one narrative phase.
pub trait QuestionGenerator: Send + Sync {
    fn generate(&self, phase: Phase, narrative: &str) -> Result<Vec<String>, String>;
}

/// A saved answer handed to the enhancer.
#[derive(Clone, Copy, Debug)]
pub struct AnsweredQuestion<'a> {
    pub phase: Phase,
    pub question: &'a str,
    pub answer: &'a str,
}

/// Produces a polished narrative from the raw phases and clarification answers.
pub trait NarrativeEnhancer: Send + Sync {
    fn enhance(
        &self,
        phases: &NarrativePhases,
        answers: &[AnsweredQuestion<'_>],
    ) -> Result<String, String>;
}

const KEYWORD_QUESTIONS: &[(&[&str], &str)] = &[
    (
        &["injur", "hurt", "bleed", "bruis"],
        "What first aid was provided, and by whom?",
    ),
    (
        &["police", "ambulance", "paramedic"],
        "Which emergency services attended, and at what time?",
    ),
    (
        &["medication", "tablet", "dose"],
        "Which medication was involved, and was the prescriber notified?",
    ),
    (
        &["restrain", "restrictive", "held"],
        "Was a restrictive practice used? Describe what was done and for how long.",
    ),
    (
        &["fall", "fell", "slip", "trip"],
        "Where exactly did the fall happen, and were there hazards nearby?",
    ),
];

fn generic_questions(phase: Phase) -> [&'static str; 3] {
    match phase {
        Phase::BeforeEvent => [
            "What was the participant doing in the hour before the incident?",
            "Who else was present before the incident began?",
            "Were there any early warning signs or changes in mood?",
        ],
        Phase::DuringEvent => [
            "What did the participant say or do as the incident unfolded?",
            "What actions did staff take while the incident was happening?",
            "Was anyone hurt, and how?",
        ],
        Phase::EndEvent => [
            "What brought the incident to an end?",
            "How long did the incident last?",
            "How was the participant once the incident ended?",
        ],
        Phase::PostEvent => [
            "Who was notified after the incident, and when?",
            "What support has been offered to the participant since?",
            "What follow-up actions have been agreed?",
        ],
    }
}

/// Template-based question generator.
///
/// Picks at most one keyword-specific question matching the narrative, then fills up with the
/// phase's generic questions. A blank phase gets only the generic questions, which prompt the
/// reporter for the missing account.
#[derive(Clone, Debug, Default)]
pub struct TemplateQuestionGenerator;

impl QuestionGenerator for TemplateQuestionGenerator {
    fn generate(&self, phase: Phase, narrative: &str) -> Result<Vec<String>, String> {
        let lowered = narrative.to_lowercase();
        let specific = KEYWORD_QUESTIONS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, question)| *question);

        let questions = specific
            .into_iter()
            .chain(generic_questions(phase))
            .take(QUESTIONS_PER_PHASE)
            .map(str::to_string)
            .collect();
        Ok(questions)
    }
}

/// Template-based enhancer that arranges the phases under headings and folds in answers.
#[derive(Clone, Debug, Default)]
pub struct TemplateEnhancer;

impl NarrativeEnhancer for TemplateEnhancer {
    fn enhance(
        &self,
        phases: &NarrativePhases,
        answers: &[AnsweredQuestion<'_>],
    ) -> Result<String, String> {
        if phases.is_blank() {
            return Err("there is no narrative to enhance".into());
        }

        let mut out = String::new();
        for phase in Phase::ALL {
            let text = phases.get(phase).trim();
            let phase_answers: Vec<_> = answers
                .iter()
                .filter(|a| a.phase == phase && !a.answer.trim().is_empty())
                .collect();
            if text.is_empty() && phase_answers.is_empty() {
                continue;
            }

            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(phase.label());
            out.push('\n');
            if text.is_empty() {
                out.push_str("No account was given for this phase.\n");
            } else {
                out.push_str(text);
                out.push('\n');
            }
            for answer in phase_answers {
                out.push_str(&format!(
                    "- {} {}\n",
                    answer.question.trim(),
                    answer.answer.trim()
                ));
            }
        }
        Ok(out)
    }
}
