//! Workflow state machine.
//!
//! The capture form is an ordered list of steps. Each step declares the steps it depends on and
//! whether the reporter may navigate back into it. The machine tracks the current step and the
//! set of completed steps; completion itself is decided by [`crate::validation::validate`].
//!
//! ## Invariants
//! - A step is only marked complete while all of its dependencies are complete.
//! - `advance` moves from step N to N+1 only when N validates; it marks N complete.
//! - `go_back` only enters steps that allow back navigation.
//! - `jump_to` only enters steps whose dependencies are all complete.
//! - The final step completes only through [`Workflow::mark_submitted`], after which the machine
//!   is terminal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::components::narrative::Phase;
use crate::config::ValidationRules;
use crate::error::{BackendError, NavigationError};
use crate::snapshot::CaptureSnapshot;
use crate::validation::{validate, StepValidation};

/// Identity of a workflow step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepId {
    Metadata,
    Narrative,
    Clarification(Phase),
    Enhancement,
    Review,
}

const CLARIFICATION_STEPS: [StepId; 4] = [
    StepId::Clarification(Phase::BeforeEvent),
    StepId::Clarification(Phase::DuringEvent),
    StepId::Clarification(Phase::EndEvent),
    StepId::Clarification(Phase::PostEvent),
];

const ENHANCEMENT_DEPENDENCIES: [StepId; 5] = [
    StepId::Narrative,
    CLARIFICATION_STEPS[0],
    CLARIFICATION_STEPS[1],
    CLARIFICATION_STEPS[2],
    CLARIFICATION_STEPS[3],
];

impl StepId {
    /// Every step, in workflow order.
    pub const ALL: [StepId; 8] = [
        StepId::Metadata,
        StepId::Narrative,
        CLARIFICATION_STEPS[0],
        CLARIFICATION_STEPS[1],
        CLARIFICATION_STEPS[2],
        CLARIFICATION_STEPS[3],
        StepId::Enhancement,
        StepId::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Metadata => "metadata",
            StepId::Narrative => "narrative",
            StepId::Clarification(Phase::BeforeEvent) => "clarification_before",
            StepId::Clarification(Phase::DuringEvent) => "clarification_during",
            StepId::Clarification(Phase::EndEvent) => "clarification_end",
            StepId::Clarification(Phase::PostEvent) => "clarification_post",
            StepId::Enhancement => "enhancement",
            StepId::Review => "review",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StepId::Metadata => "Incident details",
            StepId::Narrative => "What happened",
            StepId::Clarification(phase) => phase.label(),
            StepId::Enhancement => "Enhanced narrative",
            StepId::Review => "Review and submit",
        }
    }

    pub fn dependencies(&self) -> &'static [StepId] {
        match self {
            StepId::Metadata => &[],
            StepId::Narrative => &[StepId::Metadata],
            StepId::Clarification(_) => &[StepId::Narrative],
            StepId::Enhancement => &ENHANCEMENT_DEPENDENCIES,
            StepId::Review => &[StepId::Enhancement],
        }
    }

    /// Metadata is fixed once the incident exists, so it cannot be re-entered.
    pub fn can_navigate_back(&self) -> bool {
        !matches!(self, StepId::Metadata)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepId::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| BackendError::InvalidInput(format!("unknown step: {s}")))
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Descriptor of one step, recomputed from persisted data rather than stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub title: &'static str,
    pub dependencies: &'static [StepId],
    pub can_navigate_back: bool,
    pub completed: bool,
}

impl WorkflowStep {
    fn new(id: StepId) -> Self {
        Self {
            id,
            title: id.title(),
            dependencies: id.dependencies(),
            can_navigate_back: id.can_navigate_back(),
            completed: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Workflow {
    steps: Vec<WorkflowStep>,
    current: usize,
    submitted: bool,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    /// Starts at the metadata step with nothing completed.
    pub fn new() -> Self {
        Self {
            steps: StepId::ALL.into_iter().map(WorkflowStep::new).collect(),
            current: 0,
            submitted: false,
        }
    }

    /// Reconstructs progress for an incident being continued later.
    ///
    /// Every step (other than review) that validates and whose dependencies are complete is
    /// marked complete, in order; the current step becomes the first incomplete one.
    pub fn resume(snapshot: &CaptureSnapshot, rules: &ValidationRules) -> Self {
        let mut workflow = Self::new();
        let last = workflow.steps.len() - 1;

        for idx in 0..last {
            let id = workflow.steps[idx].id;
            if workflow.missing_dependencies(idx, None).is_empty()
                && validate(id, snapshot, rules).is_valid()
            {
                workflow.steps[idx].completed = true;
            }
        }

        if snapshot.is_submitted() {
            workflow.submitted = true;
            workflow.current = last;
            workflow.steps[last].completed = workflow.missing_dependencies(last, None).is_empty();
        } else {
            workflow.current = workflow
                .steps
                .iter()
                .position(|s| !s.completed)
                .unwrap_or(last);
        }

        tracing::debug!(
            current = %workflow.current_step(),
            completed = workflow.completed_count(),
            "resumed workflow"
        );
        workflow
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn current_step(&self) -> StepId {
        self.steps[self.current].id
    }

    pub fn is_completed(&self, id: StepId) -> bool {
        self.steps.iter().any(|s| s.id == id && s.completed)
    }

    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// True when every dependency of `id` is complete.
    pub fn can_enter(&self, id: StepId) -> bool {
        self.missing_dependencies(index_of(id), None).is_empty()
    }

    /// Validates the current step, marks it complete and moves to the next step.
    pub fn advance(
        &mut self,
        snapshot: &CaptureSnapshot,
        rules: &ValidationRules,
    ) -> Result<StepId, NavigationError> {
        if self.submitted {
            return Err(NavigationError::Submitted);
        }
        let from = self.current;
        let step = self.steps[from].id;
        if from + 1 >= self.steps.len() {
            return Err(NavigationError::AtFinalStep);
        }

        if let StepValidation::Invalid(reason) = validate(step, snapshot, rules) {
            return Err(NavigationError::StepIncomplete { step, reason });
        }

        let missing = self.missing_dependencies(from, None);
        if !missing.is_empty() {
            return Err(NavigationError::DependenciesIncomplete { step, missing });
        }

        let next = from + 1;
        let missing = self.missing_dependencies(next, Some(from));
        if !missing.is_empty() {
            return Err(NavigationError::DependenciesIncomplete {
                step: self.steps[next].id,
                missing,
            });
        }

        self.steps[from].completed = true;
        self.current = next;
        tracing::debug!(from = %step, to = %self.current_step(), "advanced");
        Ok(self.current_step())
    }

    /// Moves to the previous step if it allows back navigation.
    pub fn go_back(&mut self) -> Result<StepId, NavigationError> {
        if self.submitted {
            return Err(NavigationError::Submitted);
        }
        if self.current == 0 {
            return Err(NavigationError::AtFirstStep);
        }

        let target = &self.steps[self.current - 1];
        if !target.can_navigate_back {
            return Err(NavigationError::BackNavigationNotAllowed { step: target.id });
        }

        self.current -= 1;
        Ok(self.current_step())
    }

    /// Moves directly to `id` if all of its dependencies are complete.
    pub fn jump_to(&mut self, id: StepId) -> Result<StepId, NavigationError> {
        if self.submitted {
            return Err(NavigationError::Submitted);
        }

        let idx = index_of(id);
        let missing = self.missing_dependencies(idx, None);
        if !missing.is_empty() {
            return Err(NavigationError::DependenciesIncomplete { step: id, missing });
        }

        self.current = idx;
        Ok(id)
    }

    /// Clears completion of steps whose data no longer validates.
    ///
    /// Dependents of a cleared step are cleared too, so the dependency invariant keeps holding
    /// after the reporter edits an earlier step. Returns the cleared steps in order.
    pub fn reconcile(&mut self, snapshot: &CaptureSnapshot, rules: &ValidationRules) -> Vec<StepId> {
        let mut cleared = Vec::new();
        if self.submitted {
            return cleared;
        }

        for idx in 0..self.steps.len() {
            if !self.steps[idx].completed {
                continue;
            }
            let id = self.steps[idx].id;
            let still_valid = validate(id, snapshot, rules).is_valid()
                && self.missing_dependencies(idx, None).is_empty();
            if !still_valid {
                self.steps[idx].completed = false;
                cleared.push(id);
            }
        }

        if !cleared.is_empty() {
            tracing::info!(?cleared, "cleared step completion after data changed");
        }
        cleared
    }

    /// Completes the review step; the workflow is terminal afterwards.
    pub fn mark_submitted(&mut self) -> Result<(), NavigationError> {
        if self.submitted {
            return Err(NavigationError::Submitted);
        }
        let last = self.steps.len() - 1;
        let missing = self.missing_dependencies(last, None);
        if !missing.is_empty() {
            return Err(NavigationError::DependenciesIncomplete {
                step: self.steps[last].id,
                missing,
            });
        }

        self.steps[last].completed = true;
        self.current = last;
        self.submitted = true;
        Ok(())
    }

    /// Dependencies of step `idx` that are not complete, treating `assume_done` as complete.
    fn missing_dependencies(&self, idx: usize, assume_done: Option<usize>) -> Vec<StepId> {
        let assumed = assume_done.map(|i| self.steps[i].id);
        self.steps[idx]
            .dependencies
            .iter()
            .copied()
            .filter(|dep| Some(*dep) != assumed && !self.is_completed(*dep))
            .collect()
    }
}

fn index_of(id: StepId) -> usize {
    StepId::ALL
        .iter()
        .position(|s| *s == id)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::complete_snapshot;
    use proptest::prelude::*;

    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    #[test]
    fn test_initial_state() {
        let workflow = Workflow::new();
        assert_eq!(workflow.current_step(), StepId::Metadata);
        assert_eq!(workflow.completed_count(), 0);
        assert!(!workflow.is_submitted());
    }

    #[test]
    fn test_advance_refuses_invalid_step() {
        let mut workflow = Workflow::new();
        let err = workflow
            .advance(&CaptureSnapshot::default(), &rules())
            .unwrap_err();
        assert!(matches!(
            err,
            NavigationError::StepIncomplete {
                step: StepId::Metadata,
                ..
            }
        ));
        assert_eq!(workflow.current_step(), StepId::Metadata);
    }

    #[test]
    fn test_advance_walks_every_step_until_review() {
        let snapshot = complete_snapshot();
        let mut workflow = Workflow::new();
        for expected in &StepId::ALL[1..] {
            assert_eq!(workflow.advance(&snapshot, &rules()).unwrap(), *expected);
        }
        assert_eq!(
            workflow.advance(&snapshot, &rules()),
            Err(NavigationError::AtFinalStep)
        );
        assert_eq!(workflow.completed_count(), 7);
    }

    #[test]
    fn test_go_back_respects_navigation_permission() {
        let snapshot = complete_snapshot();
        let mut workflow = Workflow::new();
        workflow.advance(&snapshot, &rules()).unwrap();
        workflow.advance(&snapshot, &rules()).unwrap();

        assert_eq!(workflow.go_back().unwrap(), StepId::Narrative);
        assert_eq!(
            workflow.go_back(),
            Err(NavigationError::BackNavigationNotAllowed {
                step: StepId::Metadata
            })
        );
        assert!(workflow.is_completed(StepId::Narrative));
    }

    #[test]
    fn test_jump_to_requires_dependencies() {
        let snapshot = complete_snapshot();
        let mut workflow = Workflow::new();
        workflow.advance(&snapshot, &rules()).unwrap();
        workflow.advance(&snapshot, &rules()).unwrap();

        assert_eq!(
            workflow.jump_to(StepId::Clarification(Phase::PostEvent)),
            Ok(StepId::Clarification(Phase::PostEvent))
        );
        let err = workflow.jump_to(StepId::Enhancement).unwrap_err();
        match err {
            NavigationError::DependenciesIncomplete { step, missing } => {
                assert_eq!(step, StepId::Enhancement);
                assert_eq!(missing.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resume_marks_persisted_progress() {
        let mut snapshot = complete_snapshot();
        snapshot.questions.remove(&Phase::EndEvent);
        snapshot.enhanced = None;

        let workflow = Workflow::resume(&snapshot, &rules());
        assert!(workflow.is_completed(StepId::Narrative));
        assert!(workflow.is_completed(StepId::Clarification(Phase::PostEvent)));
        assert!(!workflow.is_completed(StepId::Clarification(Phase::EndEvent)));
        assert!(!workflow.is_completed(StepId::Enhancement));
        assert_eq!(
            workflow.current_step(),
            StepId::Clarification(Phase::EndEvent)
        );
    }

    #[test]
    fn test_reconcile_clears_dependents_of_invalidated_step() {
        let mut snapshot = complete_snapshot();
        let mut workflow = Workflow::new();
        for _ in 0..7 {
            workflow.advance(&snapshot, &rules()).unwrap();
        }

        if let Some(narrative) = snapshot.narrative.as_mut() {
            narrative.phases.before_event = "too short".into();
        }
        let cleared = workflow.reconcile(&snapshot, &rules());
        assert_eq!(cleared[0], StepId::Narrative);
        assert!(cleared.contains(&StepId::Enhancement));
        assert!(workflow.is_completed(StepId::Metadata));
        assert!(!workflow.can_enter(StepId::Review));
    }

    #[test]
    fn test_mark_submitted_is_terminal() {
        let snapshot = complete_snapshot();
        let mut workflow = Workflow::new();
        assert!(workflow.mark_submitted().is_err());
        for _ in 0..7 {
            workflow.advance(&snapshot, &rules()).unwrap();
        }

        workflow.mark_submitted().unwrap();
        assert!(workflow.is_completed(StepId::Review));
        assert_eq!(workflow.mark_submitted(), Err(NavigationError::Submitted));
        assert_eq!(workflow.go_back(), Err(NavigationError::Submitted));
        assert_eq!(
            workflow.jump_to(StepId::Narrative),
            Err(NavigationError::Submitted)
        );
    }

    #[test]
    fn test_step_id_string_form_round_trips() {
        for step in StepId::ALL {
            assert_eq!(step.as_str().parse::<StepId>().unwrap(), step);
        }
        let json = serde_json::to_string(&StepId::Clarification(Phase::DuringEvent)).unwrap();
        assert_eq!(json, "\"clarification_during\"");
    }

    fn workflow_with(mask: u8, current: usize) -> Workflow {
        let mut workflow = Workflow::new();
        for (i, step) in workflow.steps.iter_mut().enumerate() {
            step.completed = mask & (1 << i) != 0;
        }
        workflow.current = current;
        workflow
    }

    fn all_complete(workflow: &Workflow, deps: &[StepId], extra: Option<StepId>) -> bool {
        deps.iter()
            .all(|d| Some(*d) == extra || workflow.is_completed(*d))
    }

    proptest! {
        #[test]
        fn prop_advance_into_step_iff_dependencies_complete(mask in 0u8..=255, from in 0usize..7) {
            let snapshot = complete_snapshot();
            let mut workflow = workflow_with(mask, from);
            let current = StepId::ALL[from];
            let target = StepId::ALL[from + 1];

            let expected = all_complete(&workflow, current.dependencies(), None)
                && all_complete(&workflow, target.dependencies(), Some(current));
            let result = workflow.advance(&snapshot, &rules());

            prop_assert_eq!(result.is_ok(), expected);
            if expected {
                prop_assert_eq!(workflow.current_step(), target);
                prop_assert!(workflow.is_completed(current));
            } else {
                prop_assert_eq!(workflow.current_step(), current);
            }
        }

        #[test]
        fn prop_jump_to_iff_dependencies_complete(mask in 0u8..=255, target in 0usize..8) {
            let mut workflow = workflow_with(mask, 0);
            let id = StepId::ALL[target];
            let expected = all_complete(&workflow, id.dependencies(), None);

            prop_assert_eq!(workflow.jump_to(id).is_ok(), expected);
            prop_assert_eq!(workflow.current_step() == id, expected || target == 0);
        }
    }
}
