use thiserror::Error;

use evalia_core::error::CoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session is closed")]
    Closed,

    #[error("session task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("required questions unanswered: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    #[error("submission failed: {0}")]
    Backend(String),
}

impl SubmitError {
    /// Whether the learner can try the same submission again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Backend(_))
    }
}
