use evalia_core::grading::{grade, progress};
use evalia_core::models::Answers;
use evalia_core::models::evaluation::{Question, QuestionKind};

fn single(id: &str, points: u32, key: Option<&str>) -> Question {
    Question {
        id: id.to_string(),
        kind: QuestionKind::SingleChoice,
        prompt: String::new(),
        options: vec!["push()".to_string(), "pop()".to_string()],
        points,
        required: true,
        correct_option: key.map(str::to_string),
    }
}

fn open(id: &str, points: u32) -> Question {
    Question {
        id: id.to_string(),
        kind: QuestionKind::OpenEnded,
        prompt: String::new(),
        options: Vec::new(),
        points,
        required: false,
        correct_option: None,
    }
}

fn answers(pairs: &[(&str, &str)]) -> Answers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn fully_keyed_evaluation_is_decided() {
    let questions = vec![single("q1", 10, Some("push()")), single("q2", 10, Some("pop()"))];
    let report = grade(&questions, &answers(&[("q1", "push()"), ("q2", "push()")]), 50.0);

    assert_eq!(report.earned_points, 10);
    assert_eq!(report.graded_points, 20);
    assert_eq!(report.pending_points, 0);
    assert_eq!(report.percentage, Some(50.0));
    assert_eq!(report.passed, Some(true));
}

#[test]
fn open_ended_questions_leave_pass_undecided() {
    let questions = vec![single("q1", 10, Some("push()")), open("q2", 20)];
    let report = grade(&questions, &answers(&[("q1", "push()"), ("q2", "essay")]), 70.0);

    assert_eq!(report.earned_points, 10);
    assert_eq!(report.pending_points, 20);
    assert_eq!(report.total_points, 30);
    assert_eq!(report.percentage, Some(100.0));
    assert_eq!(report.passed, None);
}

#[test]
fn nothing_gradable_has_no_percentage() {
    let questions = vec![single("q1", 10, None), open("q2", 5)];
    let report = grade(&questions, &Answers::new(), 70.0);

    assert_eq!(report.percentage, None);
    assert_eq!(report.passed, None);
    assert_eq!(report.pending_points, 15);
}

#[test]
fn progress_counts_non_blank_answers() {
    let questions = vec![single("q1", 10, None), open("q2", 5), open("q3", 5)];
    let p = progress(&questions, &answers(&[("q1", "pop()"), ("q2", "")]));

    assert_eq!(p.answered, 1);
    assert_eq!(p.total, 3);
    assert_eq!(p.remaining, 2);
}
