//! evalia-storage
//!
//! Durable local storage for in-progress answers. A small key/value backend
//! trait with filesystem and in-memory implementations, and the versioned
//! draft store built on top of it.

pub mod backend;
pub mod drafts;
pub mod error;
