//! Provisional grading of a submitted answer set.
//!
//! Only single-choice questions with an answer key are graded here. Open-ended
//! answers and unkeyed questions wait for an instructor, so `passed` stays
//! unknown until nothing is pending.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::Answers;
use crate::models::evaluation::{Question, QuestionKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GradeReport {
    pub earned_points: u32,
    /// Points of the questions graded automatically.
    pub graded_points: u32,
    /// Points awaiting manual review.
    pub pending_points: u32,
    pub total_points: u32,
    /// `earned / graded` as a percentage; `None` when nothing was graded.
    pub percentage: Option<f64>,
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
    pub remaining: usize,
}

pub fn grade(questions: &[Question], answers: &Answers, passing_grade: f64) -> GradeReport {
    let mut earned_points = 0;
    let mut graded_points = 0;
    let mut pending_points = 0;

    for q in questions {
        match (q.kind, &q.correct_option) {
            (QuestionKind::SingleChoice, Some(key)) => {
                graded_points += q.points;
                if answers.get(&q.id) == Some(key) {
                    earned_points += q.points;
                }
            }
            _ => pending_points += q.points,
        }
    }

    let percentage =
        (graded_points > 0).then(|| f64::from(earned_points) * 100.0 / f64::from(graded_points));
    let passed = match (pending_points, percentage) {
        (0, Some(pct)) => Some(pct >= passing_grade),
        _ => None,
    };

    GradeReport {
        earned_points,
        graded_points,
        pending_points,
        total_points: graded_points + pending_points,
        percentage,
        passed,
    }
}

pub fn progress(questions: &[Question], answers: &Answers) -> Progress {
    let total = questions.len();
    let answered = questions.iter().filter(|q| q.is_answered(answers)).count();
    Progress {
        answered,
        total,
        remaining: total - answered,
    }
}
