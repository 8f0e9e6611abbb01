use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::Answers;
use crate::grading::GradeReport;

/// Why a session was submitted without the learner asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ForceReason {
    TimeExpired,
    TabSwitchLimit,
    Inactivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum SubmitTrigger {
    Manual,
    Forced { reason: ForceReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SubmissionOutcome {
    Accepted,
    Rejected,
}

/// The payload handed to the backend submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmissionRequest {
    pub submission_id: Uuid,
    pub evaluation_id: String,
    pub learner_id: String,
    pub attempt_number: u32,
    pub answers: Answers,
    pub submitted_at: jiff::Timestamp,
}

/// The backend's acknowledgment of a submission.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SubmissionAck {
    pub accepted: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Created exactly once per session; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SubmissionResult {
    pub submission_id: Uuid,
    pub evaluation_id: String,
    pub learner_id: String,
    pub attempt_number: u32,
    pub answers: Answers,
    pub submitted_at: jiff::Timestamp,
    pub outcome: SubmissionOutcome,
    pub trigger: SubmitTrigger,
    /// Required questions left blank. Only forced submissions get here with
    /// a non-empty list.
    pub unanswered_required: Vec<String>,
    pub message: Option<String>,
    pub late: bool,
    pub time_spent_seconds: u64,
    pub grade: GradeReport,
}
