//! evalia-session
//!
//! The evaluation session lifecycle: countdown clock, proctoring monitor,
//! submission state machine, and the driver loop that ties them to a
//! learner's commands.

pub mod clock;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod integrity;
pub mod submitter;
