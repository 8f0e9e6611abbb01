use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::Answers;
use crate::error::CoreError;

/// A quiz, assignment, or exam definition.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Evaluation {
    pub id: String,
    pub title: String,
    pub kind: EvaluationKind,
    pub questions: Vec<Question>,
    /// Minutes allowed once a session starts. Without one, a session runs
    /// until `due_at`, or for the default hour if that is unset too.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub due_at: Option<jiff::Timestamp>,
    pub max_attempts: u32,
    /// Percentage (0–100) of auto-graded points needed to pass.
    pub passing_grade: f64,
    #[serde(default)]
    pub proctored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EvaluationKind {
    Quiz,
    Assignment,
    Exam,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Question {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Choices for single-choice questions; empty for open-ended ones.
    #[serde(default)]
    pub options: Vec<String>,
    pub points: u32,
    #[serde(default)]
    pub required: bool,
    /// Answer key for auto-grading. Never sent to the learner's view.
    #[serde(default)]
    pub correct_option: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum QuestionKind {
    SingleChoice,
    OpenEnded,
}

impl Question {
    /// Whether `answer` is a well-formed answer to this question.
    pub fn accepts(&self, answer: &str) -> bool {
        match self.kind {
            QuestionKind::SingleChoice => self.options.iter().any(|o| o == answer),
            QuestionKind::OpenEnded => true,
        }
    }

    pub fn is_answered(&self, answers: &Answers) -> bool {
        answers.get(&self.id).is_some_and(|a| !a.trim().is_empty())
    }
}

impl Evaluation {
    /// Check the structural rules a session relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.questions.is_empty() {
            return Err(CoreError::InvalidEvaluation(format!(
                "evaluation {} has no questions",
                self.id
            )));
        }
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidEvaluation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.passing_grade) {
            return Err(CoreError::InvalidEvaluation(format!(
                "passing_grade {} is outside [0, 100]",
                self.passing_grade
            )));
        }

        let mut seen = HashSet::new();
        for q in &self.questions {
            if !seen.insert(q.id.as_str()) {
                return Err(CoreError::InvalidEvaluation(format!(
                    "duplicate question id {}",
                    q.id
                )));
            }
            if q.kind == QuestionKind::SingleChoice {
                if q.options.is_empty() {
                    return Err(CoreError::InvalidEvaluation(format!(
                        "single-choice question {} has no options",
                        q.id
                    )));
                }
                if let Some(key) = &q.correct_option
                    && !q.accepts(key)
                {
                    return Err(CoreError::InvalidEvaluation(format!(
                        "answer key of question {} is not one of its options",
                        q.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Stable description of a question set: ids and kinds in order.
///
/// Stored alongside drafts so a reload can tell whether the evaluation was
/// edited after the draft was written.
pub fn fingerprint(questions: &[Question]) -> String {
    questions
        .iter()
        .map(|q| {
            let kind = match q.kind {
                QuestionKind::SingleChoice => "sc",
                QuestionKind::OpenEnded => "oe",
            };
            format!("{}:{kind}", q.id)
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Ids of required questions without a non-empty answer, in question order.
pub fn missing_required(questions: &[Question], answers: &Answers) -> Vec<String> {
    questions
        .iter()
        .filter(|q| q.required && !q.is_answered(answers))
        .map(|q| q.id.clone())
        .collect()
}

/// Drop answers that no longer fit `questions`: unknown ids and
/// single-choice answers that are not among the current options.
/// Returns the number of answers removed.
pub fn reconcile(questions: &[Question], answers: &mut Answers) -> usize {
    let before = answers.len();
    answers.retain(|id, answer| {
        questions
            .iter()
            .find(|q| &q.id == id)
            .is_some_and(|q| q.accepts(answer))
    });
    before - answers.len()
}
