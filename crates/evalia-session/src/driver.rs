//! One running session.
//!
//! [`open`] restores the draft, starts the clock and (for proctored
//! evaluations) the integrity monitor, then spawns a loop that owns the
//! session's answers. The host talks to it through a [`SessionHandle`] and
//! listens for [`SessionUpdate`]s. Every finalization, whatever triggered
//! it, goes through the [`SubmissionCoordinator`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use evalia_core::grading::{self, Progress};
use evalia_core::models::evaluation::Evaluation;
use evalia_core::models::session::{EvaluationSession, SessionStatus};
use evalia_core::models::submission::{ForceReason, SubmissionResult, SubmitTrigger};
use evalia_storage::drafts::{DraftKey, DraftStore};

use crate::clock::{ClockConfig, ClockEvent, SessionClock};
use crate::coordinator::{Begin, SubmissionCoordinator, SubmitOutcome};
use crate::error::{SessionError, SubmitError};
use crate::integrity::{
    BrowserSignal, Disposition, IntegrityConfig, IntegrityMonitor, IntegrityNotice,
};
use crate::submitter::Submitter;

/// Everything a session needs from its host.
#[derive(Clone)]
pub struct SessionDeps {
    pub submitter: Arc<dyn Submitter>,
    pub drafts: Arc<DraftStore>,
    pub integrity: IntegrityConfig,
    pub clock: ClockConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnerCommand {
    Answer { question_id: String, answer: String },
    ClearAnswer { question_id: String },
    SaveDraft,
    Submit,
    /// Leave without submitting. The draft is saved on a best-effort basis.
    Abandon,
}

#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Tick { remaining_secs: u64 },
    LowTime { remaining_secs: u64 },
    IntegrityWarning { tab_switches: u32 },
    AnswerRecorded { question_id: String, progress: Progress },
    AnswerRejected { question_id: String, reason: String },
    DraftSaved { stored: bool },
    Submitting { trigger: SubmitTrigger },
    ValidationFailed { missing: Vec<String> },
    SubmitFailed { message: String },
    Finished(SubmissionResult),
    Abandoned,
}

/// Host-side handle on a running session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<LearnerCommand>,
    coordinator: Arc<SubmissionCoordinator>,
    clock: SessionClock,
    monitor: Option<IntegrityMonitor>,
    restored_answers: usize,
    task: JoinHandle<Option<SubmissionResult>>,
}

impl SessionHandle {
    pub fn send(&self, command: LearnerCommand) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn answer(&self, question_id: &str, answer: &str) -> Result<(), SessionError> {
        self.send(LearnerCommand::Answer {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
        })
    }

    pub fn submit(&self) -> Result<(), SessionError> {
        self.send(LearnerCommand::Submit)
    }

    /// Forward a page signal to the monitor. Returns whether the host must
    /// block the interaction. Unproctored sessions allow everything.
    pub fn observe(&self, signal: &BrowserSignal) -> Disposition {
        match &self.monitor {
            Some(monitor) => monitor.observe(signal),
            None => Disposition::Allow,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.coordinator.status()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.clock.remaining()
    }

    /// Answers recovered from the draft when the session opened.
    pub fn restored_answers(&self) -> usize {
        self.restored_answers
    }

    pub fn monitor(&self) -> Option<&IntegrityMonitor> {
        self.monitor.as_ref()
    }

    /// Wait for the session to be submitted or abandoned. `None` =
    /// abandoned. Dropping the handle instead abandons the session.
    pub async fn join(self) -> Result<Option<SubmissionResult>, SessionError> {
        let SessionHandle { commands, task, .. } = self;
        let finished = task.await.map_err(|e| SessionError::Task(e.to_string()));
        drop(commands);
        finished
    }
}

/// Open attempt `attempt_number` of `evaluation` and start its loop.
pub fn open(
    evaluation: &Evaluation,
    learner_id: &str,
    attempt_number: u32,
    deps: SessionDeps,
) -> Result<(SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>), SessionError> {
    deps.integrity.validate()?;

    let now = jiff::Timestamp::now();
    let mut session = EvaluationSession::open(evaluation, learner_id, attempt_number, now)?;

    let draft_key = DraftKey::new(&session.evaluation_id, learner_id, &session.questions);
    session.answers = deps.drafts.load(&draft_key, &session.questions);
    let restored_answers = session.answers.len();

    let (clock, clock_events) = SessionClock::start(session.remaining_seconds(now));

    let mut coordinator = SubmissionCoordinator::new(
        &session,
        evaluation.passing_grade,
        deps.submitter,
        Arc::clone(&deps.drafts),
    )
    .with_clock(clock.clone());

    let (monitor, notices) = if session.is_proctored {
        let (monitor, notices) = IntegrityMonitor::new(deps.integrity)?;
        monitor.start();
        coordinator = coordinator.with_monitor(monitor.clone());
        (Some(monitor), Some(notices))
    } else {
        (None, None)
    };
    let coordinator = Arc::new(coordinator);

    tracing::info!(
        evaluation_id = %session.evaluation_id,
        learner_id,
        attempt_number,
        restored_answers,
        proctored = session.is_proctored,
        remaining_secs = clock.remaining(),
        "evaluation session opened"
    );

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let session_loop = SessionLoop {
        session,
        drafts: deps.drafts,
        draft_key,
        coordinator: Arc::clone(&coordinator),
        clock: clock.clone(),
        monitor: monitor.clone(),
        updates: updates_tx,
        done_tx,
        low_time_warning_secs: deps.clock.low_time_warning_secs,
        low_time_warned: false,
        forced: None,
    };
    let task = tokio::spawn(session_loop.run(commands_rx, clock_events, notices, done_rx));

    Ok((
        SessionHandle {
            commands: commands_tx,
            coordinator,
            clock,
            monitor,
            restored_answers,
            task,
        },
        updates_rx,
    ))
}

type SubmitDone = Result<SubmitOutcome, SubmitError>;

struct SessionLoop {
    session: EvaluationSession,
    drafts: Arc<DraftStore>,
    draft_key: DraftKey,
    coordinator: Arc<SubmissionCoordinator>,
    clock: SessionClock,
    monitor: Option<IntegrityMonitor>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    done_tx: mpsc::UnboundedSender<SubmitDone>,
    low_time_warning_secs: u64,
    low_time_warned: bool,
    /// Set once the learner can no longer change the answers.
    forced: Option<ForceReason>,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LearnerCommand>,
        mut clock_events: mpsc::UnboundedReceiver<ClockEvent>,
        notices: Option<mpsc::UnboundedReceiver<IntegrityNotice>>,
        mut done: mpsc::UnboundedReceiver<SubmitDone>,
    ) -> Option<SubmissionResult> {
        // Unproctored sessions get a receiver that never yields.
        let (_notices_keepalive, idle_notices) = mpsc::unbounded_channel();
        let mut notices = notices.unwrap_or(idle_notices);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(LearnerCommand::Abandon) | None => {
                        self.abandon();
                        return None;
                    }
                    Some(command) => self.handle_command(command),
                },
                Some(event) = clock_events.recv() => self.handle_clock(event),
                Some(notice) = notices.recv() => self.handle_notice(notice),
                Some(finished) = done.recv() => {
                    if let Some(result) = self.handle_done(finished) {
                        return Some(result);
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: LearnerCommand) {
        if let Some(monitor) = &self.monitor {
            monitor.touch();
        }
        match command {
            LearnerCommand::Answer {
                question_id,
                answer,
            } => {
                if let Some(reason) = self.edit_blocked() {
                    self.emit(SessionUpdate::AnswerRejected {
                        question_id,
                        reason,
                    });
                    return;
                }
                match self.session.set_answer(&question_id, &answer) {
                    Ok(()) => self.answer_changed(question_id),
                    Err(e) => self.emit(SessionUpdate::AnswerRejected {
                        question_id,
                        reason: e.to_string(),
                    }),
                }
            }
            LearnerCommand::ClearAnswer { question_id } => {
                if let Some(reason) = self.edit_blocked() {
                    self.emit(SessionUpdate::AnswerRejected {
                        question_id,
                        reason,
                    });
                    return;
                }
                match self.session.clear_answer(&question_id) {
                    Ok(_) => self.answer_changed(question_id),
                    Err(e) => self.emit(SessionUpdate::AnswerRejected {
                        question_id,
                        reason: e.to_string(),
                    }),
                }
            }
            LearnerCommand::SaveDraft => {
                let stored = self.drafts.save(&self.draft_key, &self.session.answers);
                self.emit(SessionUpdate::DraftSaved { stored });
            }
            LearnerCommand::Submit => {
                // Past the deadline the retry keeps the forced semantics.
                let trigger = match self.forced {
                    Some(reason) => SubmitTrigger::Forced { reason },
                    None => SubmitTrigger::Manual,
                };
                self.begin_submit(trigger);
            }
            LearnerCommand::Abandon => self.abandon(),
        }
    }

    fn handle_clock(&mut self, event: ClockEvent) {
        match event {
            ClockEvent::Tick { remaining_secs } => {
                self.emit(SessionUpdate::Tick { remaining_secs });
                if !self.low_time_warned && remaining_secs < self.low_time_warning_secs {
                    self.low_time_warned = true;
                    self.emit(SessionUpdate::LowTime { remaining_secs });
                }
            }
            ClockEvent::Expired => {
                tracing::info!(evaluation_id = %self.session.evaluation_id, "time expired");
                self.force(ForceReason::TimeExpired);
            }
        }
    }

    fn handle_notice(&mut self, notice: IntegrityNotice) {
        match notice {
            IntegrityNotice::Warning { tab_switches } => {
                self.emit(SessionUpdate::IntegrityWarning { tab_switches });
            }
            IntegrityNotice::ForceSubmit(reason) => self.force(reason),
        }
    }

    fn handle_done(&mut self, finished: SubmitDone) -> Option<SubmissionResult> {
        match finished {
            Ok(SubmitOutcome::Submitted(result)) | Ok(SubmitOutcome::AlreadySubmitted(result)) => {
                self.emit(SessionUpdate::Finished(result.clone()));
                Some(result)
            }
            Ok(SubmitOutcome::Ignored) => None,
            Err(SubmitError::Validation { missing }) => {
                self.emit(SessionUpdate::ValidationFailed { missing });
                None
            }
            Err(e) => {
                self.emit(SessionUpdate::SubmitFailed {
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn force(&mut self, reason: ForceReason) {
        if let Some(first) = self.forced {
            // A failed forced submission waits for the learner to retry.
            if self.coordinator.status() == SessionStatus::Failed {
                tracing::debug!(
                    evaluation_id = %self.session.evaluation_id,
                    ?first,
                    ?reason,
                    "forced submission failed earlier, not retrying on a new trigger"
                );
                return;
            }
        } else {
            self.forced = Some(reason);
        }
        self.begin_submit(SubmitTrigger::Forced { reason });
    }

    /// Claim the submission slot here, then await the backend on a separate
    /// task so ticks and notices keep flowing while the call is pending.
    fn begin_submit(&mut self, trigger: SubmitTrigger) {
        let pending = match self.coordinator.begin(self.session.answers.clone(), trigger) {
            Ok(Begin::Started(pending)) => pending,
            Ok(Begin::Settled(SubmitOutcome::Ignored)) => return,
            Ok(Begin::Settled(outcome)) => {
                let _ = self.done_tx.send(Ok(outcome));
                return;
            }
            Err(e) => {
                let _ = self.done_tx.send(Err(e));
                return;
            }
        };

        self.emit(SessionUpdate::Submitting {
            trigger: pending.trigger(),
        });
        let coordinator = Arc::clone(&self.coordinator);
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let _ = done.send(coordinator.deliver(pending).await);
        });
    }

    fn edit_blocked(&self) -> Option<String> {
        if self.forced.is_some() {
            return Some("time is up, answers can no longer change".to_string());
        }
        match self.coordinator.status() {
            SessionStatus::InProgress => None,
            SessionStatus::Failed => {
                self.coordinator.resume();
                None
            }
            SessionStatus::Submitting => Some("submission in progress".to_string()),
            SessionStatus::Submitted => Some("evaluation already submitted".to_string()),
        }
    }

    fn answer_changed(&mut self, question_id: String) {
        self.drafts.save(&self.draft_key, &self.session.answers);
        let progress = grading::progress(&self.session.questions, &self.session.answers);
        self.emit(SessionUpdate::AnswerRecorded {
            question_id,
            progress,
        });
    }

    fn abandon(&mut self) {
        if self.coordinator.status().is_terminal() {
            return;
        }
        self.drafts.save(&self.draft_key, &self.session.answers);
        self.clock.stop();
        if let Some(monitor) = &self.monitor {
            monitor.stop();
        }
        tracing::info!(
            evaluation_id = %self.session.evaluation_id,
            answers = self.session.answers.len(),
            "session abandoned"
        );
        self.emit(SessionUpdate::Abandoned);
    }

    fn emit(&self, update: SessionUpdate) {
        // The host may have stopped listening; the session carries on.
        let _ = self.updates.send(update);
    }
}
