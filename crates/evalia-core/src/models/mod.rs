pub mod evaluation;
pub mod integrity;
pub mod session;
pub mod submission;

use std::collections::BTreeMap;

/// Answers keyed by question id. Ordered so that serialized snapshots are
/// byte-stable.
pub type Answers = BTreeMap<String, String>;
