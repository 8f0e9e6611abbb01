//! Versioned draft snapshots.
//!
//! A draft is the learner's in-progress answers for one evaluation. Reads
//! never fail the session: a missing, corrupt, or too-new record loads as an
//! empty answer set. Writes are best-effort and only logged on failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use evalia_core::draft_keys;
use evalia_core::models::Answers;
use evalia_core::models::evaluation::{Question, fingerprint, reconcile};

use crate::backend::DraftBackend;
use crate::error::StorageError;

/// Current draft schema version. Bump this when changing [`StoredDraft`];
/// each bump requires a corresponding step in [`migrate`].
pub const CURRENT_VERSION: u32 = 1;

/// Identifies one learner's draft for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftKey {
    pub evaluation_id: String,
    pub learner_id: String,
    /// Fingerprint of the question set the answers were written against.
    pub question_fingerprint: String,
}

impl DraftKey {
    pub fn new(evaluation_id: &str, learner_id: &str, questions: &[Question]) -> Self {
        Self {
            evaluation_id: evaluation_id.to_string(),
            learner_id: learner_id.to_string(),
            question_fingerprint: fingerprint(questions),
        }
    }

    pub fn storage_key(&self) -> String {
        draft_keys::draft(&self.learner_id, &self.evaluation_id)
    }
}

/// On-disk shape of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDraft {
    /// Schema version. Missing or 0 = a bare answers mapping.
    #[serde(default)]
    pub schema_version: u32,
    pub evaluation_id: String,
    pub learner_id: String,
    #[serde(default)]
    pub question_fingerprint: String,
    pub answers: Answers,
}

pub struct DraftStore {
    backend: Arc<dyn DraftBackend>,
}

impl DraftStore {
    pub fn new(backend: Arc<dyn DraftBackend>) -> Self {
        Self { backend }
    }

    /// Load answers for `key`, reconciled against `questions`.
    ///
    /// Answers for questions that no longer exist, and single-choice answers
    /// that no longer match an option, are dropped; everything else survives
    /// an edit of the evaluation.
    pub fn load(&self, key: &DraftKey, questions: &[Question]) -> Answers {
        let stored = match self.read(key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Answers::new(),
            Err(e) => {
                tracing::warn!(
                    evaluation_id = %key.evaluation_id,
                    learner_id = %key.learner_id,
                    error = %e,
                    "discarding unreadable draft"
                );
                return Answers::new();
            }
        };

        let mut answers = stored.answers;
        let dropped = reconcile(questions, &mut answers);
        if stored.question_fingerprint != key.question_fingerprint {
            tracing::info!(
                evaluation_id = %key.evaluation_id,
                dropped,
                kept = answers.len(),
                "question set changed since draft was saved"
            );
        }

        tracing::debug!(
            evaluation_id = %key.evaluation_id,
            answers = answers.len(),
            "draft loaded"
        );
        answers
    }

    /// Overwrite the draft for `key`. Failures are logged, never returned.
    ///
    /// Returns whether the snapshot reached storage.
    pub fn save(&self, key: &DraftKey, answers: &Answers) -> bool {
        match self.write(key, answers) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    evaluation_id = %key.evaluation_id,
                    learner_id = %key.learner_id,
                    error = %e,
                    "failed to save draft"
                );
                false
            }
        }
    }

    /// Remove the draft for `key`. Only call after a confirmed submission.
    pub fn clear(&self, key: &DraftKey) {
        match self.backend.delete(&key.storage_key()) {
            Ok(()) => {
                tracing::debug!(evaluation_id = %key.evaluation_id, "draft cleared");
            }
            Err(e) => {
                tracing::warn!(
                    evaluation_id = %key.evaluation_id,
                    error = %e,
                    "failed to clear draft"
                );
            }
        }
    }

    /// Evaluation ids with a stored draft for `learner_id`.
    pub fn pending_evaluations(&self, learner_id: &str) -> Vec<String> {
        let prefix = draft_keys::learner_drafts_prefix(learner_id);
        match self.backend.list(&prefix) {
            Ok(keys) => keys
                .iter()
                .filter_map(|k| {
                    k.rsplit('/')
                        .next()?
                        .strip_prefix("evaluation-draft-")?
                        .strip_suffix(".json")
                        .map(str::to_string)
                })
                .collect(),
            Err(e) => {
                tracing::warn!(learner_id, error = %e, "failed to list drafts");
                Vec::new()
            }
        }
    }

    /// Read and migrate the stored record without reconciling it.
    pub fn read(&self, key: &DraftKey) -> Result<Option<StoredDraft>, StorageError> {
        let storage_key = key.storage_key();
        let Some(body) = self.backend.read(&storage_key)? else {
            return Ok(None);
        };

        // Parse as raw JSON so we can run migrations before deserializing.
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        let on_disk_version = json
            .get("schema_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let migrated = migrate(json, on_disk_version, key)?;
        let stored: StoredDraft =
            serde_json::from_value(migrated).map_err(|e| StorageError::Corrupt {
                key: storage_key.clone(),
                reason: e.to_string(),
            })?;

        if stored.evaluation_id != key.evaluation_id || stored.learner_id != key.learner_id {
            return Err(StorageError::Corrupt {
                key: storage_key,
                reason: "draft belongs to a different session".to_string(),
            });
        }
        Ok(Some(stored))
    }

    fn write(&self, key: &DraftKey, answers: &Answers) -> Result<(), StorageError> {
        let stored = StoredDraft {
            schema_version: CURRENT_VERSION,
            evaluation_id: key.evaluation_id.clone(),
            learner_id: key.learner_id.clone(),
            question_fingerprint: key.question_fingerprint.clone(),
            answers: answers.clone(),
        };
        let body = serde_json::to_vec_pretty(&stored)?;
        self.backend.write(&key.storage_key(), &body)
    }
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(
    json: serde_json::Value,
    from_version: u64,
    key: &DraftKey,
) -> Result<serde_json::Value, StorageError> {
    if from_version > u64::from(CURRENT_VERSION) {
        return Err(StorageError::UnsupportedVersion {
            found: from_version,
            supported: CURRENT_VERSION,
        });
    }

    let mut json = json;

    // v0 → v1: the record was the bare answers object. Wrap it; the empty
    // fingerprint forces reconciliation on load.
    if from_version < 1 {
        if !json.is_object() {
            return Err(StorageError::Corrupt {
                key: key.storage_key(),
                reason: "draft is not a JSON object".to_string(),
            });
        }
        json = serde_json::json!({
            "schema_version": 1,
            "evaluation_id": key.evaluation_id,
            "learner_id": key.learner_id,
            "question_fingerprint": "",
            "answers": json,
        });
        tracing::info!(evaluation_id = %key.evaluation_id, "migrated draft v0 → v1");
    }

    Ok(json)
}
