//! Draft storage key conventions.
//!
//! Pure string functions. These define the canonical layout of draft
//! records in whatever backend holds them.

pub const DRAFTS_PREFIX: &str = "drafts/";

pub fn draft(learner_id: &str, evaluation_id: &str) -> String {
    format!("{DRAFTS_PREFIX}{learner_id}/evaluation-draft-{evaluation_id}.json")
}

pub fn learner_drafts_prefix(learner_id: &str) -> String {
    format!("{DRAFTS_PREFIX}{learner_id}/")
}
