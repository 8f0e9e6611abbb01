//! One line of terminal input.

use evalia_session::driver::LearnerCommand;
use evalia_session::integrity::BrowserSignal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Learner(LearnerCommand),
    /// Stand-in for a page event the host would normally report.
    Signal(BrowserSignal),
    Status,
    Help,
}

pub const HELP: &str = "\
commands:
  answer <question> <text>   record an answer
  clear <question>           clear an answer
  save                       save the draft now
  submit                     submit the evaluation
  status                     show time left and switches
  quit                       leave without submitting
page events:
  hidden | visible | blur | focus | menu | copy | paste | idle-reset
  key [ctrl+][shift+]<key>";

/// `Ok(None)` for a blank line.
pub fn parse(line: &str) -> eyre::Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word {
        "answer" => {
            let (question_id, answer) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| eyre::eyre!("usage: answer <question> <text>"))?;
            Input::Learner(LearnerCommand::Answer {
                question_id: question_id.to_string(),
                answer: answer.trim().to_string(),
            })
        }
        "clear" => {
            if rest.is_empty() {
                eyre::bail!("usage: clear <question>");
            }
            Input::Learner(LearnerCommand::ClearAnswer {
                question_id: rest.to_string(),
            })
        }
        "save" => Input::Learner(LearnerCommand::SaveDraft),
        "submit" => Input::Learner(LearnerCommand::Submit),
        "quit" | "exit" => Input::Learner(LearnerCommand::Abandon),
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "hidden" => Input::Signal(BrowserSignal::VisibilityHidden),
        "visible" => Input::Signal(BrowserSignal::VisibilityVisible),
        "blur" => Input::Signal(BrowserSignal::FocusLost),
        "focus" => Input::Signal(BrowserSignal::FocusGained),
        "menu" => Input::Signal(BrowserSignal::ContextMenu),
        "copy" => Input::Signal(BrowserSignal::Copy),
        "paste" => Input::Signal(BrowserSignal::Paste),
        "idle-reset" => Input::Signal(BrowserSignal::Input),
        "key" => Input::Signal(parse_key(rest)?),
        other => eyre::bail!("unknown command `{other}`, try `help`"),
    };
    Ok(Some(input))
}

fn parse_key(chord: &str) -> eyre::Result<BrowserSignal> {
    let mut ctrl = false;
    let mut shift = false;
    let mut key = None;
    for part in chord.split('+') {
        match part.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "cmd" => ctrl = true,
            "shift" => shift = true,
            "" => eyre::bail!("usage: key [ctrl+][shift+]<key>"),
            _ => key = Some(part.trim().to_string()),
        }
    }
    let key = key.ok_or_else(|| eyre::eyre!("usage: key [ctrl+][shift+]<key>"))?;
    Ok(BrowserSignal::Key { key, ctrl, shift })
}
