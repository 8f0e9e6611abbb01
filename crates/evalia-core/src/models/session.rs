use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::Answers;
use super::evaluation::{Evaluation, Question};
use crate::error::CoreError;

/// Session length used when an evaluation has neither a time limit nor a
/// due date.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// One learner's attempt at an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EvaluationSession {
    pub evaluation_id: String,
    pub learner_id: String,
    pub questions: Vec<Question>,
    pub answers: Answers,
    pub started_at: Timestamp,
    pub deadline: Timestamp,
    #[serde(default)]
    pub due_at: Option<Timestamp>,
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub is_proctored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionStatus {
    InProgress,
    Submitting,
    Submitted,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Submitted
    }
}

impl EvaluationSession {
    /// Open attempt `attempt_number` of `evaluation` for `learner_id`.
    ///
    /// The deadline is the earlier of the time limit and the due date; with
    /// neither, the session gets [`DEFAULT_DURATION_MINUTES`].
    pub fn open(
        evaluation: &Evaluation,
        learner_id: &str,
        attempt_number: u32,
        started_at: Timestamp,
    ) -> Result<Self, CoreError> {
        evaluation.validate()?;

        if attempt_number == 0 || attempt_number > evaluation.max_attempts {
            return Err(CoreError::AttemptsExhausted {
                attempt: attempt_number,
                max: evaluation.max_attempts,
            });
        }
        if let Some(due_at) = evaluation.due_at
            && due_at <= started_at
        {
            return Err(CoreError::PastDue { due_at });
        }

        let after = |minutes: i64| started_at.checked_add(SignedDuration::from_mins(minutes));
        let deadline = match (evaluation.time_limit_minutes, evaluation.due_at) {
            (Some(limit), Some(due_at)) => after(i64::from(limit))?.min(due_at),
            (Some(limit), None) => after(i64::from(limit))?,
            (None, Some(due_at)) => due_at,
            (None, None) => after(DEFAULT_DURATION_MINUTES)?,
        };

        Ok(Self {
            evaluation_id: evaluation.id.clone(),
            learner_id: learner_id.to_string(),
            questions: evaluation.questions.clone(),
            answers: Answers::new(),
            started_at,
            deadline,
            due_at: evaluation.due_at,
            attempt_number,
            max_attempts: evaluation.max_attempts,
            is_proctored: evaluation.proctored,
        })
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Whole seconds left before the deadline, zero once it has passed.
    pub fn remaining_seconds(&self, now: Timestamp) -> u64 {
        let left = self.deadline.duration_since(now).as_secs();
        u64::try_from(left).unwrap_or(0)
    }

    pub fn elapsed_seconds(&self, now: Timestamp) -> u64 {
        let spent = now.duration_since(self.started_at).as_secs();
        u64::try_from(spent).unwrap_or(0)
    }

    pub fn is_late(&self, at: Timestamp) -> bool {
        self.due_at.is_some_and(|due| at > due)
    }

    /// Record an answer after checking it against the question.
    pub fn set_answer(&mut self, question_id: &str, answer: &str) -> Result<(), CoreError> {
        let question = self
            .question(question_id)
            .ok_or_else(|| CoreError::UnknownQuestion(question_id.to_string()))?;
        if !question.accepts(answer) {
            return Err(CoreError::InvalidOption {
                question_id: question_id.to_string(),
                answer: answer.to_string(),
            });
        }
        self.answers.insert(question_id.to_string(), answer.to_string());
        Ok(())
    }

    /// Remove an answer. Returns whether one was present.
    pub fn clear_answer(&mut self, question_id: &str) -> Result<bool, CoreError> {
        if self.question(question_id).is_none() {
            return Err(CoreError::UnknownQuestion(question_id.to_string()));
        }
        Ok(self.answers.remove(question_id).is_some())
    }
}
