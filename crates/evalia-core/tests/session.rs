use evalia_core::error::CoreError;
use evalia_core::models::Answers;
use evalia_core::models::evaluation::{
    Evaluation, EvaluationKind, Question, QuestionKind, fingerprint, missing_required, reconcile,
};
use evalia_core::models::session::EvaluationSession;
use jiff::{SignedDuration, Timestamp};

fn question(id: &str, kind: QuestionKind, required: bool) -> Question {
    let options = match kind {
        QuestionKind::SingleChoice => vec!["<a>".to_string(), "<link>".to_string()],
        QuestionKind::OpenEnded => Vec::new(),
    };
    Question {
        id: id.to_string(),
        kind,
        prompt: format!("prompt {id}"),
        options,
        points: 10,
        required,
        correct_option: None,
    }
}

fn evaluation() -> Evaluation {
    Evaluation {
        id: "eval-1".to_string(),
        title: "HTML basics".to_string(),
        kind: EvaluationKind::Quiz,
        questions: vec![
            question("q1", QuestionKind::SingleChoice, true),
            question("q2", QuestionKind::OpenEnded, true),
            question("q3", QuestionKind::OpenEnded, false),
        ],
        time_limit_minutes: Some(30),
        due_at: None,
        max_attempts: 2,
        passing_grade: 70.0,
        proctored: false,
    }
}

fn t0() -> Timestamp {
    "2026-03-01T09:00:00Z".parse().unwrap()
}

#[test]
fn deadline_follows_time_limit() {
    let session = EvaluationSession::open(&evaluation(), "learner-1", 1, t0()).unwrap();
    assert_eq!(session.deadline, t0() + SignedDuration::from_mins(30));
    assert_eq!(session.remaining_seconds(t0()), 1800);
}

#[test]
fn deadline_is_capped_by_due_date() {
    let mut eval = evaluation();
    eval.due_at = Some(t0() + SignedDuration::from_mins(10));
    let session = EvaluationSession::open(&eval, "learner-1", 1, t0()).unwrap();
    assert_eq!(session.remaining_seconds(t0()), 600);
}

#[test]
fn untimed_evaluation_gets_default_hour() {
    let mut eval = evaluation();
    eval.time_limit_minutes = None;
    let session = EvaluationSession::open(&eval, "learner-1", 1, t0()).unwrap();
    assert_eq!(session.remaining_seconds(t0()), 3600);
}

#[test]
fn remaining_never_goes_negative() {
    let session = EvaluationSession::open(&evaluation(), "learner-1", 1, t0()).unwrap();
    let later = t0() + SignedDuration::from_hours(2);
    assert_eq!(session.remaining_seconds(later), 0);
    assert_eq!(session.elapsed_seconds(later), 7200);
}

#[test]
fn attempts_beyond_limit_are_rejected() {
    let err = EvaluationSession::open(&evaluation(), "learner-1", 3, t0()).unwrap_err();
    assert!(matches!(err, CoreError::AttemptsExhausted { attempt: 3, max: 2 }));
}

#[test]
fn past_due_evaluation_cannot_be_opened() {
    let mut eval = evaluation();
    eval.due_at = Some(t0() - SignedDuration::from_mins(1));
    let err = EvaluationSession::open(&eval, "learner-1", 1, t0()).unwrap_err();
    assert!(matches!(err, CoreError::PastDue { .. }));
}

#[test]
fn set_answer_checks_question_and_options() {
    let mut session = EvaluationSession::open(&evaluation(), "learner-1", 1, t0()).unwrap();

    session.set_answer("q1", "<a>").unwrap();
    session.set_answer("q2", "markup").unwrap();

    assert!(matches!(
        session.set_answer("q9", "x"),
        Err(CoreError::UnknownQuestion(id)) if id == "q9"
    ));
    assert!(matches!(
        session.set_answer("q1", "<div>"),
        Err(CoreError::InvalidOption { .. })
    ));
    assert_eq!(session.answers.len(), 2);
    assert!(session.clear_answer("q2").unwrap());
    assert!(!session.clear_answer("q2").unwrap());
}

#[test]
fn missing_required_ignores_blank_answers() {
    let eval = evaluation();
    let mut answers = Answers::new();
    answers.insert("q1".to_string(), "<a>".to_string());
    answers.insert("q2".to_string(), "   ".to_string());

    assert_eq!(missing_required(&eval.questions, &answers), vec!["q2"]);
}

#[test]
fn reconcile_drops_stale_answers() {
    let eval = evaluation();
    let mut answers = Answers::new();
    answers.insert("q1".to_string(), "<href>".to_string());
    answers.insert("q2".to_string(), "kept".to_string());
    answers.insert("gone".to_string(), "dropped".to_string());

    assert_eq!(reconcile(&eval.questions, &mut answers), 2);
    assert_eq!(answers.len(), 1);
    assert_eq!(answers["q2"], "kept");
}

#[test]
fn fingerprint_tracks_ids_and_kinds() {
    let eval = evaluation();
    assert_eq!(fingerprint(&eval.questions), "q1:sc|q2:oe|q3:oe");
}

#[test]
fn validate_rejects_duplicate_ids_and_bad_keys() {
    let mut eval = evaluation();
    eval.questions.push(question("q1", QuestionKind::OpenEnded, false));
    assert!(eval.validate().is_err());

    let mut eval = evaluation();
    eval.questions[0].correct_option = Some("<p>".to_string());
    assert!(eval.validate().is_err());

    let mut eval = evaluation();
    eval.questions[0].correct_option = Some("<a>".to_string());
    assert!(eval.validate().is_ok());
}
