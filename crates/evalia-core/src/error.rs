use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid evaluation: {0}")]
    InvalidEvaluation(String),

    #[error("attempt {attempt} exceeds the {max} allowed attempts")]
    AttemptsExhausted { attempt: u32, max: u32 },

    #[error("evaluation was due at {due_at}")]
    PastDue { due_at: jiff::Timestamp },

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("answer '{answer}' is not an option of question {question_id}")]
    InvalidOption { question_id: String, answer: String },

    #[error("timestamp arithmetic failed: {0}")]
    Timestamp(#[from] jiff::Error),
}
