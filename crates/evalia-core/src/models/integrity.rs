use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Something the integrity monitor flagged during a proctored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum IntegrityEventKind {
    TabSwitch,
    Inactivity,
    DevtoolsAttempt,
    /// Context menu or clipboard use that the host blocked.
    BlockedInteraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IntegrityEvent {
    pub kind: IntegrityEventKind,
    pub at: jiff::Timestamp,
}
