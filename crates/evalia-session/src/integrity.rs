//! Proctoring for sessions that require it.
//!
//! The host forwards page signals (visibility, focus, keys, clipboard) to
//! [`IntegrityMonitor::observe`]. The monitor counts tab switches, tells the
//! host which interactions to block, and raises [`IntegrityNotice`]s: one
//! warning, then at most one forced submission, either for too many tab
//! switches or for inactivity. Blocking is best-effort, not a security
//! boundary.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use evalia_core::models::integrity::{IntegrityEvent, IntegrityEventKind};
use evalia_core::models::submission::ForceReason;

use crate::error::SessionError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Tab switches at which the learner is warned, once.
    #[serde(default = "default_warn_after")]
    pub warn_after_tab_switches: u32,
    /// Tab switches at which the session is force-submitted.
    #[serde(default = "default_force_after")]
    pub force_after_tab_switches: u32,
    /// Idle window before the session is force-submitted.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_warn_after() -> u32 {
    3
}

fn default_force_after() -> u32 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    300
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            warn_after_tab_switches: default_warn_after(),
            force_after_tab_switches: default_force_after(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl IntegrityConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.warn_after_tab_switches == 0 {
            return Err(SessionError::InvalidConfig(
                "warn_after_tab_switches must be at least 1".to_string(),
            ));
        }
        if self.force_after_tab_switches <= self.warn_after_tab_switches {
            return Err(SessionError::InvalidConfig(format!(
                "force_after_tab_switches ({}) must exceed warn_after_tab_switches ({})",
                self.force_after_tab_switches, self.warn_after_tab_switches
            )));
        }
        if self.idle_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "idle_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// A page-level signal forwarded by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSignal {
    VisibilityHidden,
    VisibilityVisible,
    FocusLost,
    FocusGained,
    ContextMenu,
    Copy,
    Paste,
    Key {
        key: String,
        ctrl: bool,
        shift: bool,
    },
    /// Pointer movement, typing, scrolling: anything that proves presence.
    Input,
}

impl BrowserSignal {
    fn is_devtools_shortcut(&self) -> bool {
        let BrowserSignal::Key { key, ctrl, shift } = self else {
            return false;
        };
        let key = key.to_ascii_uppercase();
        key == "F12"
            || (*ctrl && *shift && matches!(key.as_str(), "I" | "J" | "C"))
            || (*ctrl && !*shift && key == "U")
    }

    fn is_clipboard_shortcut(&self) -> bool {
        let BrowserSignal::Key { key, ctrl, shift } = self else {
            return false;
        };
        *ctrl && !*shift && matches!(key.to_ascii_uppercase().as_str(), "C" | "V" | "X")
    }
}

/// What the host should do with the interaction it just reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Allow,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityNotice {
    Warning { tab_switches: u32 },
    ForceSubmit(ForceReason),
}

struct MonitorState {
    active: bool,
    away: bool,
    tab_switches: u32,
    warned: bool,
    forced: bool,
    last_activity: Instant,
    events: Vec<IntegrityEvent>,
    watchdog: Option<AbortHandle>,
}

struct Shared {
    config: IntegrityConfig,
    state: Mutex<MonitorState>,
    notices: mpsc::UnboundedSender<IntegrityNotice>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, state: &mut MonitorState, kind: IntegrityEventKind) {
        state.events.push(IntegrityEvent {
            kind,
            at: jiff::Timestamp::now(),
        });
    }

    fn force(&self, state: &mut MonitorState, reason: ForceReason) {
        if state.forced {
            return;
        }
        state.forced = true;
        tracing::warn!(
            ?reason,
            tab_switches = state.tab_switches,
            "integrity monitor forcing submission"
        );
        let _ = self.notices.send(IntegrityNotice::ForceSubmit(reason));
    }
}

/// Cheap-to-clone handle on one session's monitor.
#[derive(Clone)]
pub struct IntegrityMonitor {
    shared: Arc<Shared>,
}

impl IntegrityMonitor {
    pub fn new(
        config: IntegrityConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<IntegrityNotice>), SessionError> {
        config.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(MonitorState {
                active: false,
                away: false,
                tab_switches: 0,
                warned: false,
                forced: false,
                last_activity: Instant::now(),
                events: Vec::new(),
                watchdog: None,
            }),
            notices: tx,
        });
        Ok((Self { shared }, rx))
    }

    /// Begin observing and arm the idle watchdog. Must be called inside a
    /// tokio runtime.
    pub fn start(&self) {
        let mut state = self.shared.state();
        if state.active {
            return;
        }
        state.active = true;
        state.last_activity = Instant::now();
        let task = tokio::spawn(watch_idle(
            Arc::downgrade(&self.shared),
            self.shared.config.idle_timeout(),
        ));
        state.watchdog = Some(task.abort_handle());
        tracing::debug!(
            warn_after = self.shared.config.warn_after_tab_switches,
            force_after = self.shared.config.force_after_tab_switches,
            idle_timeout_secs = self.shared.config.idle_timeout_secs,
            "integrity monitor started"
        );
    }

    /// Stop observing. No notice is sent after this returns.
    pub fn stop(&self) {
        let mut state = self.shared.state();
        if !state.active {
            return;
        }
        state.active = false;
        if let Some(task) = state.watchdog.take() {
            task.abort();
        }
        tracing::debug!(
            tab_switches = state.tab_switches,
            events = state.events.len(),
            "integrity monitor stopped"
        );
    }

    /// Count learner activity that reaches the session without a page
    /// signal, such as an answer or a submit. Pushes the idle deadline back.
    pub fn touch(&self) {
        let mut state = self.shared.state();
        if state.active {
            state.last_activity = Instant::now();
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.state().active
    }

    pub fn tab_switches(&self) -> u32 {
        self.shared.state().tab_switches
    }

    /// Everything flagged so far, oldest first.
    pub fn events(&self) -> Vec<IntegrityEvent> {
        self.shared.state().events.clone()
    }

    pub fn observe(&self, signal: &BrowserSignal) -> Disposition {
        let shared = &self.shared;
        let mut state = shared.state();
        if !state.active {
            return Disposition::Allow;
        }

        match signal {
            // Hiding the tab usually also blurs the window; count the pair once.
            BrowserSignal::VisibilityHidden | BrowserSignal::FocusLost => {
                if !state.away {
                    state.away = true;
                    state.tab_switches += 1;
                    shared.record(&mut state, IntegrityEventKind::TabSwitch);
                    let count = state.tab_switches;
                    tracing::info!(tab_switches = count, "tab switch detected");

                    if count >= shared.config.warn_after_tab_switches && !state.warned {
                        state.warned = true;
                        let _ = shared
                            .notices
                            .send(IntegrityNotice::Warning { tab_switches: count });
                    }
                    if count >= shared.config.force_after_tab_switches {
                        shared.force(&mut state, ForceReason::TabSwitchLimit);
                    }
                }
                Disposition::Allow
            }
            BrowserSignal::VisibilityVisible | BrowserSignal::FocusGained => {
                state.away = false;
                state.last_activity = Instant::now();
                Disposition::Allow
            }
            BrowserSignal::ContextMenu | BrowserSignal::Copy | BrowserSignal::Paste => {
                state.last_activity = Instant::now();
                shared.record(&mut state, IntegrityEventKind::BlockedInteraction);
                Disposition::Block
            }
            key if key.is_devtools_shortcut() => {
                state.last_activity = Instant::now();
                shared.record(&mut state, IntegrityEventKind::DevtoolsAttempt);
                tracing::info!("devtools shortcut blocked");
                Disposition::Block
            }
            key if key.is_clipboard_shortcut() => {
                state.last_activity = Instant::now();
                shared.record(&mut state, IntegrityEventKind::BlockedInteraction);
                Disposition::Block
            }
            BrowserSignal::Key { .. } | BrowserSignal::Input => {
                state.last_activity = Instant::now();
                Disposition::Allow
            }
        }
    }
}

async fn watch_idle(shared: Weak<Shared>, timeout: Duration) {
    loop {
        let deadline = {
            let Some(strong) = shared.upgrade() else {
                return;
            };
            let state = strong.state();
            if !state.active || state.forced {
                return;
            }
            state.last_activity + timeout
        };

        tokio::time::sleep_until(deadline).await;

        let Some(strong) = shared.upgrade() else {
            return;
        };
        let mut state = strong.state();
        if !state.active || state.forced {
            return;
        }
        if Instant::now() >= state.last_activity + timeout {
            strong.record(&mut state, IntegrityEventKind::Inactivity);
            strong.force(&mut state, ForceReason::Inactivity);
            return;
        }
    }
}
