use evalia_player::input::{Input, parse};
use evalia_session::driver::LearnerCommand;
use evalia_session::integrity::BrowserSignal;

#[test]
fn answer_keeps_the_rest_of_the_line() {
    assert_eq!(
        parse("answer q2   adds an item to the end ").unwrap(),
        Some(Input::Learner(LearnerCommand::Answer {
            question_id: "q2".to_string(),
            answer: "adds an item to the end".to_string(),
        }))
    );
}

#[test]
fn blank_lines_are_ignored() {
    assert_eq!(parse("   ").unwrap(), None);
}

#[test]
fn session_commands() {
    assert_eq!(
        parse("submit").unwrap(),
        Some(Input::Learner(LearnerCommand::Submit))
    );
    assert_eq!(
        parse("quit").unwrap(),
        Some(Input::Learner(LearnerCommand::Abandon))
    );
    assert_eq!(
        parse("clear q1").unwrap(),
        Some(Input::Learner(LearnerCommand::ClearAnswer {
            question_id: "q1".to_string()
        }))
    );
    assert_eq!(parse("status").unwrap(), Some(Input::Status));
}

#[test]
fn key_chords() {
    assert_eq!(
        parse("key ctrl+shift+I").unwrap(),
        Some(Input::Signal(BrowserSignal::Key {
            key: "I".to_string(),
            ctrl: true,
            shift: true,
        }))
    );
    assert_eq!(
        parse("key F12").unwrap(),
        Some(Input::Signal(BrowserSignal::Key {
            key: "F12".to_string(),
            ctrl: false,
            shift: false,
        }))
    );
}

#[test]
fn malformed_input_is_an_error() {
    assert!(parse("answer q1").is_err());
    assert!(parse("clear").is_err());
    assert!(parse("key ctrl+").is_err());
    assert!(parse("dance").is_err());
}
