//! evalia-player library root.
//!
//! Exposes the host pieces (config, HTTP submitter, input parsing) so
//! integration tests can exercise them without a terminal.

pub mod config;
pub mod http;
pub mod input;
