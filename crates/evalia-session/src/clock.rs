//! Session countdown.
//!
//! One timer per session. The clock task ticks once per second and reports
//! the remaining seconds; at zero it reports [`ClockEvent::Expired`] once and
//! ends. Stopping the clock guarantees nothing further is sent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, interval_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { remaining_secs: u64 },
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Remaining seconds below which the learner gets a one-time warning.
    #[serde(default = "default_low_time_warning_secs")]
    pub low_time_warning_secs: u64,
}

fn default_low_time_warning_secs() -> u64 {
    300
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            low_time_warning_secs: default_low_time_warning_secs(),
        }
    }
}

struct ClockState {
    stopped: bool,
    task: Option<AbortHandle>,
}

struct Shared {
    remaining: AtomicU64,
    state: Mutex<ClockState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running countdown. Cheap to clone; the countdown ends when
/// it expires, when [`SessionClock::stop`] is called, or once every handle
/// has been dropped.
#[derive(Clone)]
pub struct SessionClock {
    shared: Arc<Shared>,
}

impl SessionClock {
    /// Start counting down from `duration_secs`. Must be called inside a
    /// tokio runtime.
    pub fn start(duration_secs: u64) -> (Self, mpsc::UnboundedReceiver<ClockEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            remaining: AtomicU64::new(duration_secs),
            state: Mutex::new(ClockState {
                stopped: false,
                task: None,
            }),
        });

        let task = tokio::spawn(run(Arc::downgrade(&shared), duration_secs, tx));
        shared.state().task = Some(task.abort_handle());

        tracing::debug!(duration_secs, "session clock started");
        (Self { shared }, rx)
    }

    /// Seconds left as of the last tick.
    pub fn remaining(&self) -> u64 {
        self.shared.remaining.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.shared.state().stopped
    }

    /// Cancel the countdown. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.state();
        if state.stopped {
            return;
        }
        state.stopped = true;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        tracing::debug!(remaining = self.remaining(), "session clock stopped");
    }
}

async fn run(shared: Weak<Shared>, duration_secs: u64, tx: mpsc::UnboundedSender<ClockEvent>) {
    let mut remaining = duration_secs;
    let period = Duration::from_secs(1);
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        if remaining > 0 {
            ticker.tick().await;
            remaining -= 1;
        }

        let Some(shared) = shared.upgrade() else {
            return;
        };
        // Check and send under the lock so `stop` can never race a send.
        let mut state = shared.state();
        if state.stopped {
            return;
        }
        shared.remaining.store(remaining, Ordering::Release);

        if remaining == 0 {
            state.stopped = true;
            state.task = None;
            let _ = tx.send(ClockEvent::Expired);
            tracing::debug!("session clock expired");
            return;
        }
        if tx.send(ClockEvent::Tick { remaining_secs: remaining }).is_err() {
            state.stopped = true;
            return;
        }
    }
}

/// Render seconds as `H:MM:SS` from one hour up, `M:SS` below.
pub fn format_remaining(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
