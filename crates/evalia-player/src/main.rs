use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tokio::sync::mpsc;

use evalia_core::models::evaluation::Evaluation;
use evalia_core::models::submission::{SubmissionOutcome, SubmissionResult};
use evalia_player::config::{self, LogFormat, PlayerConfig};
use evalia_player::http::HttpSubmitter;
use evalia_player::input::{self, HELP, Input};
use evalia_session::clock::format_remaining;
use evalia_session::driver::{self, LearnerCommand, SessionDeps, SessionHandle, SessionUpdate};
use evalia_session::integrity::Disposition;
use evalia_storage::backend::FsBackend;
use evalia_storage::drafts::DraftStore;

const DEFAULT_SUBMIT_URL: &str = "http://localhost:8080/submissions";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let mut args = std::env::args().skip(1);
    let Some(evaluation_path) = args.next() else {
        eyre::bail!("usage: evalia-player <evaluation.json> [attempt]");
    };
    let attempt_number = match args.next() {
        Some(n) => n.parse().wrap_err("attempt must be a positive number")?,
        None => 1,
    };

    let config = load_or_init_config()?;
    init_tracing(config.log_format);

    let contents = std::fs::read_to_string(&evaluation_path)
        .wrap_err_with(|| format!("failed to read {evaluation_path}"))?;
    let evaluation: Evaluation = serde_json::from_str(&contents)
        .wrap_err_with(|| format!("{evaluation_path} is not a valid evaluation"))?;

    let drafts_dir = config.drafts_dir()?;
    let drafts = Arc::new(DraftStore::new(Arc::new(FsBackend::new(drafts_dir))));
    let pending = drafts.pending_evaluations(&config.learner_id);
    if !pending.is_empty() {
        tracing::info!(?pending, "unsubmitted drafts found");
    }

    let deps = SessionDeps {
        submitter: Arc::new(HttpSubmitter::new(
            config.submit_url.clone(),
            Duration::from_secs(config.submit_timeout_secs),
        )),
        drafts,
        integrity: config.integrity.clone(),
        clock: config.clock.clone(),
    };
    let (handle, updates) = driver::open(&evaluation, &config.learner_id, attempt_number, deps)?;

    println!(
        "{} (attempt {attempt_number}), {} questions, {} left",
        evaluation.title,
        evaluation.questions.len(),
        format_remaining(handle.remaining_secs()),
    );
    if handle.restored_answers() > 0 {
        println!("restored {} answers from your draft", handle.restored_answers());
    }
    for (i, question) in evaluation.questions.iter().enumerate() {
        let marker = if question.required { "*" } else { " " };
        println!("{marker}{}. [{}] {}", i + 1, question.id, question.prompt);
        for option in &question.options {
            println!("      - {option}");
        }
    }
    println!("type `help` for commands");

    run(&handle, updates).await;
    handle.join().await?;
    Ok(())
}

fn load_or_init_config() -> Result<PlayerConfig> {
    let dir = config::config_dir()?;
    if config::has_config(&dir) {
        return config::load_config(&dir);
    }
    let learner_id = std::env::var("USER").unwrap_or_else(|_| "learner".to_string());
    let config = PlayerConfig::new(DEFAULT_SUBMIT_URL, learner_id);
    config::save_config(&dir, &config)?;
    Ok(config)
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Pump terminal input into the session until it ends. Closing stdin
/// abandons the session.
async fn run(handle: &SessionHandle, mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.recv(), if stdin_open => {
                let Some(line) = line else {
                    stdin_open = false;
                    let _ = handle.send(LearnerCommand::Abandon);
                    continue;
                };
                match input::parse(&line) {
                    Ok(Some(input)) => dispatch(handle, input),
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            update = updates.recv() => match update {
                Some(update) => render(&update),
                None => return,
            },
        }
    }
}

fn dispatch(handle: &SessionHandle, input: Input) {
    match input {
        Input::Learner(command) => {
            if let Err(e) = handle.send(command) {
                println!("{e}");
            }
        }
        Input::Signal(signal) => {
            if handle.observe(&signal) == Disposition::Block {
                println!("blocked during a proctored session");
            }
        }
        Input::Status => {
            let switches = handle.monitor().map(|m| m.tab_switches()).unwrap_or(0);
            println!(
                "{:?}, {} left, {switches} tab switches",
                handle.status(),
                format_remaining(handle.remaining_secs()),
            );
        }
        Input::Help => println!("{HELP}"),
    }
}

/// Std thread so a blocked read never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn render(update: &SessionUpdate) {
    match update {
        SessionUpdate::Tick { remaining_secs } => {
            if remaining_secs % 60 == 0 {
                println!("{} left", format_remaining(*remaining_secs));
            }
        }
        SessionUpdate::LowTime { remaining_secs } => {
            println!("only {} left", format_remaining(*remaining_secs));
        }
        SessionUpdate::IntegrityWarning { tab_switches } => {
            println!("warning: you have left this page {tab_switches} times");
        }
        SessionUpdate::AnswerRecorded {
            question_id,
            progress,
        } => {
            println!(
                "saved {question_id} ({}/{} answered)",
                progress.answered, progress.total
            );
        }
        SessionUpdate::AnswerRejected {
            question_id,
            reason,
        } => println!("{question_id}: {reason}"),
        SessionUpdate::DraftSaved { stored } => {
            println!("{}", if *stored { "draft saved" } else { "draft could not be saved" });
        }
        SessionUpdate::Submitting { .. } => println!("submitting..."),
        SessionUpdate::ValidationFailed { missing } => {
            println!("answer these before submitting: {}", missing.join(", "));
        }
        SessionUpdate::SubmitFailed { message } => {
            println!("{message}; your answers are kept, `submit` to retry");
        }
        SessionUpdate::Finished(result) => render_result(result),
        SessionUpdate::Abandoned => println!("left without submitting; draft saved"),
    }
}

fn render_result(result: &SubmissionResult) {
    match result.outcome {
        SubmissionOutcome::Accepted => println!("submitted ({})", result.submission_id),
        SubmissionOutcome::Rejected => println!(
            "submission rejected: {}",
            result.message.as_deref().unwrap_or("no reason given")
        ),
    }
    if !result.unanswered_required.is_empty() {
        println!("unanswered: {}", result.unanswered_required.join(", "));
    }
    if result.late {
        println!("submitted after the due date");
    }
    let grade = &result.grade;
    if let Some(percentage) = grade.percentage {
        println!(
            "auto-graded {}/{} points ({percentage:.0}%)",
            grade.earned_points, grade.graded_points
        );
    }
    if grade.pending_points > 0 {
        println!("{} points await review", grade.pending_points);
    }
    if let Some(passed) = grade.passed {
        println!("{}", if passed { "passed" } else { "not passed" });
    }
}
