#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evalia_core::models::evaluation::{Evaluation, EvaluationKind, Question, QuestionKind};
use evalia_core::models::submission::{SubmissionAck, SubmissionRequest};
use evalia_session::error::SubmitError;
use evalia_session::submitter::{BoxFuture, Submitter};
use evalia_storage::backend::MemoryBackend;
use evalia_storage::drafts::DraftStore;

/// Replies from a script, then accepts everything.
#[derive(Default)]
pub struct ScriptedSubmitter {
    replies: Mutex<VecDeque<Result<SubmissionAck, SubmitError>>>,
    delay: Duration,
    calls: AtomicU32,
    requests: Mutex<Vec<SubmissionRequest>>,
}

impl ScriptedSubmitter {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn scripted(replies: Vec<Result<SubmissionAck, SubmitError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Submitter for ScriptedSubmitter {
    fn submit<'a>(
        &'a self,
        request: &'a SubmissionRequest,
    ) -> BoxFuture<'a, Result<SubmissionAck, SubmitError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let scripted = self.replies.lock().unwrap().pop_front();
            scripted.unwrap_or(Ok(SubmissionAck {
                accepted: true,
                message: None,
            }))
        })
    }
}

pub fn network_error() -> Result<SubmissionAck, SubmitError> {
    Err(SubmitError::Backend("connection reset".to_string()))
}

pub fn memory_drafts() -> Arc<DraftStore> {
    Arc::new(DraftStore::new(Arc::new(MemoryBackend::new())))
}

fn question(id: &str, kind: QuestionKind, required: bool) -> Question {
    let (options, correct_option) = match kind {
        QuestionKind::SingleChoice => (
            vec!["push()".to_string(), "pop()".to_string(), "shift()".to_string()],
            Some("push()".to_string()),
        ),
        QuestionKind::OpenEnded => (Vec::new(), None),
    };
    Question {
        id: id.to_string(),
        kind,
        prompt: format!("question {id}"),
        options,
        points: 10,
        required,
        correct_option,
    }
}

/// Two required questions (q1 single-choice, q2 open-ended) and one
/// optional open-ended question (q3).
pub fn evaluation(time_limit_minutes: u32, proctored: bool) -> Evaluation {
    Evaluation {
        id: "js-basics".to_string(),
        title: "JavaScript Basics".to_string(),
        kind: EvaluationKind::Quiz,
        questions: vec![
            question("q1", QuestionKind::SingleChoice, true),
            question("q2", QuestionKind::OpenEnded, true),
            question("q3", QuestionKind::OpenEnded, false),
        ],
        time_limit_minutes: Some(time_limit_minutes),
        due_at: None,
        max_attempts: 3,
        passing_grade: 70.0,
        proctored,
    }
}
