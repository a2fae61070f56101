use crate::session::Capability;
use crate::workflow::StepId;

/// Errors reported by an [`IncidentBackend`](crate::backend::IncidentBackend).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("not authenticated: {0}")]
    Unauthenticated(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A debounced save that reached the backend and failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("auto-save failed for {key}: {source}")]
pub struct AutoSaveError {
    pub key: String,
    #[source]
    pub source: BackendError,
}

/// A refused workflow transition.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("{step} is incomplete: {reason}")]
    StepIncomplete { step: StepId, reason: String },
    #[error(
        "{step} requires {} to be completed first",
        .missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    )]
    DependenciesIncomplete { step: StepId, missing: Vec<StepId> },
    #[error("navigating back to {step} is not allowed")]
    BackNavigationNotAllowed { step: StepId },
    #[error("already at the first step")]
    AtFirstStep,
    #[error("the final step completes by submission, not by advancing")]
    AtFinalStep,
    #[error("the workflow has been submitted")]
    Submitted,
}

/// Coarse classification used to decide how a failure is surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Shown inline next to the step; the reporter fixes the input.
    Validation,
    /// Shown as a per-field badge; editing again retries.
    AutoSave,
    /// Shown with a "try again" action; the workflow stays on the same step.
    Generation,
    /// Fatal for the current action; the reporter must sign in again.
    Authentication,
    /// Shown as a notification; the incident keeps its prior status.
    Submission,
    /// Any other backend failure.
    Backend,
}

/// Errors surfaced by the capture workflow.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    AutoSave(#[from] AutoSaveError),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("authentication required: {0}")]
    Unauthenticated(String),
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("workflow is incomplete: {}", .missing.join("; "))]
    Incomplete { missing: Vec<String> },
    #[error("a submission is already in progress")]
    SubmissionInProgress,
    #[error("the incident has already been submitted")]
    AlreadySubmitted,
    #[error("no incident has been created yet")]
    NoIncident,
    #[error("an incident has already been created in this session")]
    IncidentAlreadyCreated,
    #[error("capability {0:?} is not granted for this session")]
    MissingCapability(Capability),
    #[error("backend error: {0}")]
    Backend(BackendError),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthenticated(msg) => CaptureError::Unauthenticated(msg),
            other => CaptureError::Backend(other),
        }
    }
}

impl CaptureError {
    /// Maps a failed question or enhancement generation call.
    pub fn generation(err: BackendError) -> Self {
        match err {
            BackendError::Unauthenticated(msg) => CaptureError::Unauthenticated(msg),
            other => CaptureError::Generation(other.to_string()),
        }
    }

    /// Maps a failed submission call.
    pub fn submission(err: BackendError) -> Self {
        match err {
            BackendError::Unauthenticated(msg) => CaptureError::Unauthenticated(msg),
            other => CaptureError::Submission(other.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::Navigation(_)
            | CaptureError::InvalidInput(_)
            | CaptureError::Incomplete { .. }
            | CaptureError::NoIncident
            | CaptureError::IncidentAlreadyCreated
            | CaptureError::MissingCapability(_) => ErrorKind::Validation,
            CaptureError::AutoSave(e) if matches!(e.source, BackendError::Unauthenticated(_)) => {
                ErrorKind::Authentication
            }
            CaptureError::AutoSave(_) => ErrorKind::AutoSave,
            CaptureError::Generation(_) => ErrorKind::Generation,
            CaptureError::Unauthenticated(_) => ErrorKind::Authentication,
            CaptureError::Submission(_)
            | CaptureError::SubmissionInProgress
            | CaptureError::AlreadySubmitted => ErrorKind::Submission,
            CaptureError::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Everything except an authentication failure can be retried in place.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Authentication
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_backend_errors_are_fatal() {
        let err = CaptureError::generation(BackendError::Unauthenticated("expired".into()));
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(!err.is_recoverable());

        let err: CaptureError = BackendError::Unauthenticated("expired".into()).into();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_generation_and_submission_failures_are_recoverable() {
        let err = CaptureError::generation(BackendError::Unavailable("timeout".into()));
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.is_recoverable());

        let err = CaptureError::submission(BackendError::Conflict("stale".into()));
        assert_eq!(err.kind(), ErrorKind::Submission);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_dependency_message_lists_missing_steps() {
        let err = NavigationError::DependenciesIncomplete {
            step: StepId::Enhancement,
            missing: vec![StepId::Narrative, StepId::Review],
        };
        assert_eq!(
            err.to_string(),
            "enhancement requires narrative, review to be completed first"
        );
    }
}
