//! The one place a session is finalized.
//!
//! ```text
//! InProgress -> Submitting -> Submitted            (terminal)
//! InProgress -> Submitting -> Failed -> InProgress (retry)
//! ```
//!
//! Manual submissions and every forced trigger (clock expiry, tab-switch
//! limit, inactivity) go through [`SubmissionCoordinator::begin`], which
//! checks and sets the status flag under a short lock, and then
//! [`SubmissionCoordinator::deliver`], which awaits the backend. A second
//! call arriving mid-flight is ignored rather than queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use evalia_core::grading;
use evalia_core::models::Answers;
use evalia_core::models::evaluation::missing_required;
use evalia_core::models::session::{EvaluationSession, SessionStatus};
use evalia_core::models::submission::{
    ForceReason, SubmissionOutcome, SubmissionRequest, SubmissionResult, SubmitTrigger,
};
use evalia_storage::drafts::{DraftKey, DraftStore};

use crate::clock::SessionClock;
use crate::error::SubmitError;
use crate::integrity::IntegrityMonitor;
use crate::submitter::Submitter;

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// This call finalized the session.
    Submitted(SubmissionResult),
    /// Another submission was in flight; nothing happened.
    Ignored,
    /// The session was already finalized by an earlier call.
    AlreadySubmitted(SubmissionResult),
}

/// A submission that holds the `Submitting` slot. Hand it to
/// [`SubmissionCoordinator::deliver`]; dropping it leaves the session stuck
/// in `Submitting`.
#[must_use]
#[derive(Debug)]
pub struct PendingSubmission {
    answers: Answers,
    trigger: SubmitTrigger,
    missing: Vec<String>,
}

impl PendingSubmission {
    pub fn trigger(&self) -> SubmitTrigger {
        self.trigger
    }
}

#[derive(Debug)]
pub enum Begin {
    Started(PendingSubmission),
    /// Nothing to deliver: another submission is in flight or the session
    /// is already finalized.
    Settled(SubmitOutcome),
}

struct CoordinatorState {
    status: SessionStatus,
    result: Option<SubmissionResult>,
    backend_calls: u32,
    last_error: Option<String>,
}

pub struct SubmissionCoordinator {
    session: EvaluationSession,
    passing_grade: f64,
    submitter: Arc<dyn Submitter>,
    drafts: Arc<DraftStore>,
    draft_key: DraftKey,
    clock: Option<SessionClock>,
    monitor: Option<IntegrityMonitor>,
    state: Mutex<CoordinatorState>,
}

impl SubmissionCoordinator {
    /// `session` supplies identity and questions; its answers are ignored,
    /// each submit call carries its own snapshot.
    pub fn new(
        session: &EvaluationSession,
        passing_grade: f64,
        submitter: Arc<dyn Submitter>,
        drafts: Arc<DraftStore>,
    ) -> Self {
        let draft_key = DraftKey::new(
            &session.evaluation_id,
            &session.learner_id,
            &session.questions,
        );
        let mut session = session.clone();
        session.answers.clear();
        Self {
            session,
            passing_grade,
            submitter,
            drafts,
            draft_key,
            clock: None,
            monitor: None,
            state: Mutex::new(CoordinatorState {
                status: SessionStatus::InProgress,
                result: None,
                backend_calls: 0,
                last_error: None,
            }),
        }
    }

    /// Stop `clock` once the session is finalized.
    pub fn with_clock(mut self, clock: SessionClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Stop `monitor` once the session is finalized.
    pub fn with_monitor(mut self, monitor: IntegrityMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn draft_key(&self) -> &DraftKey {
        &self.draft_key
    }

    pub fn status(&self) -> SessionStatus {
        self.state().status
    }

    pub fn result(&self) -> Option<SubmissionResult> {
        self.state().result.clone()
    }

    /// Number of times the backend has been called.
    pub fn backend_calls(&self) -> u32 {
        self.state().backend_calls
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// Leave `Failed` so the learner can keep working before retrying.
    pub fn resume(&self) {
        let mut state = self.state();
        if state.status == SessionStatus::Failed {
            state.status = SessionStatus::InProgress;
            tracing::debug!(
                evaluation_id = %self.session.evaluation_id,
                "session resumed after failed submission"
            );
        }
    }

    /// Learner-initiated submission. Fails validation if a required question
    /// is unanswered.
    pub async fn submit(&self, answers: Answers) -> Result<SubmitOutcome, SubmitError> {
        self.finalize(answers, SubmitTrigger::Manual).await
    }

    /// Submission the learner can no longer influence. Unanswered required
    /// questions are reported in the result instead of blocking it.
    pub async fn force_submit(
        &self,
        reason: ForceReason,
        answers: Answers,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.finalize(answers, SubmitTrigger::Forced { reason }).await
    }

    async fn finalize(
        &self,
        answers: Answers,
        trigger: SubmitTrigger,
    ) -> Result<SubmitOutcome, SubmitError> {
        match self.begin(answers, trigger)? {
            Begin::Started(pending) => self.deliver(pending).await,
            Begin::Settled(outcome) => Ok(outcome),
        }
    }

    /// Claim the `Submitting` slot without awaiting anything.
    pub fn begin(&self, answers: Answers, trigger: SubmitTrigger) -> Result<Begin, SubmitError> {
        let evaluation_id = &self.session.evaluation_id;
        let missing = missing_required(&self.session.questions, &answers);

        let mut state = self.state();
        match state.status {
            SessionStatus::Submitting => {
                tracing::debug!(
                    %evaluation_id,
                    ?trigger,
                    "submission already in flight, ignoring"
                );
                return Ok(Begin::Settled(SubmitOutcome::Ignored));
            }
            SessionStatus::Submitted => {
                let outcome = match &state.result {
                    Some(result) => SubmitOutcome::AlreadySubmitted(result.clone()),
                    None => SubmitOutcome::Ignored,
                };
                return Ok(Begin::Settled(outcome));
            }
            SessionStatus::InProgress | SessionStatus::Failed => {}
        }

        if !missing.is_empty() {
            if trigger == SubmitTrigger::Manual {
                tracing::info!(%evaluation_id, ?missing, "submission blocked by validation");
                return Err(SubmitError::Validation { missing });
            }
            tracing::warn!(
                %evaluation_id,
                ?trigger,
                ?missing,
                "forced submission with unanswered required questions"
            );
        }

        state.status = SessionStatus::Submitting;
        state.backend_calls += 1;
        Ok(Begin::Started(PendingSubmission {
            answers,
            trigger,
            missing,
        }))
    }

    /// Send a claimed submission to the backend and record the outcome.
    pub async fn deliver(&self, pending: PendingSubmission) -> Result<SubmitOutcome, SubmitError> {
        let PendingSubmission {
            answers,
            trigger,
            missing,
        } = pending;
        let evaluation_id = &self.session.evaluation_id;

        // The draft must match what is being sent in case the call fails.
        self.drafts.save(&self.draft_key, &answers);

        let submitted_at = jiff::Timestamp::now();
        let request = SubmissionRequest {
            submission_id: Uuid::new_v4(),
            evaluation_id: evaluation_id.clone(),
            learner_id: self.session.learner_id.clone(),
            attempt_number: self.session.attempt_number,
            answers,
            submitted_at,
        };
        tracing::info!(
            %evaluation_id,
            submission_id = %request.submission_id,
            ?trigger,
            answers = request.answers.len(),
            "submitting evaluation"
        );

        let ack = match self.submitter.submit(&request).await {
            Ok(ack) => ack,
            Err(e) => {
                let mut state = self.state();
                state.status = SessionStatus::Failed;
                state.last_error = Some(e.to_string());
                tracing::warn!(
                    %evaluation_id,
                    error = %e,
                    "submission failed, draft kept for retry"
                );
                return Err(e);
            }
        };

        let outcome = if ack.accepted {
            SubmissionOutcome::Accepted
        } else {
            SubmissionOutcome::Rejected
        };
        let grade = grading::grade(&self.session.questions, &request.answers, self.passing_grade);
        let result = SubmissionResult {
            submission_id: request.submission_id,
            evaluation_id: request.evaluation_id,
            learner_id: request.learner_id,
            attempt_number: request.attempt_number,
            late: self.session.is_late(submitted_at),
            time_spent_seconds: self.session.elapsed_seconds(submitted_at),
            answers: request.answers,
            submitted_at,
            outcome,
            trigger,
            unanswered_required: missing,
            message: ack.message,
            grade,
        };

        {
            let mut state = self.state();
            state.status = SessionStatus::Submitted;
            state.result = Some(result.clone());
            state.last_error = None;
        }

        match outcome {
            SubmissionOutcome::Accepted => self.drafts.clear(&self.draft_key),
            SubmissionOutcome::Rejected => {
                tracing::warn!(
                    %evaluation_id,
                    message = result.message.as_deref().unwrap_or(""),
                    "submission rejected by backend, draft kept"
                );
            }
        }
        self.halt();

        tracing::info!(
            %evaluation_id,
            submission_id = %result.submission_id,
            ?outcome,
            late = result.late,
            "evaluation submitted"
        );
        Ok(SubmitOutcome::Submitted(result))
    }

    /// Stop the clock and the monitor. Called on every terminal transition.
    pub fn halt(&self) {
        if let Some(clock) = &self.clock {
            clock.stop();
        }
        if let Some(monitor) = &self.monitor {
            monitor.stop();
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
