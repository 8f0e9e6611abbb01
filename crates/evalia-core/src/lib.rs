//! evalia-core
//!
//! Pure domain types for evaluation sessions: evaluations and questions,
//! session bookkeeping, integrity events, submission results, provisional
//! grading, and draft storage key conventions.
//! Nothing here touches a runtime or the filesystem.

pub mod draft_keys;
pub mod error;
pub mod grading;
pub mod models;
