//! Threaded query lifecycle
//!
//! One state enum under one mutex. The worker and the caller facade move the
//! state through [`Lifecycle::can_transition_to`]; every other transition is
//! rejected.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{QueryError, WaitPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Created,
    Starting,
    Running,
    Closing,
    Closed,
    Failed,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 6] = [
        Lifecycle::Created,
        Lifecycle::Starting,
        Lifecycle::Running,
        Lifecycle::Closing,
        Lifecycle::Closed,
        Lifecycle::Failed,
    ];

    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Created, Starting)
                | (Created, Closed)
                | (Starting, Running)
                | (Starting, Failed)
                | (Starting, Closing)
                | (Running, Closing)
                | (Closing, Closed)
        )
    }

    /// True once the startup handshake has an outcome.
    pub fn startup_resolved(self) -> bool {
        !matches!(self, Lifecycle::Created | Lifecycle::Starting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Closed | Lifecycle::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Created => "created",
            Lifecycle::Starting => "starting",
            Lifecycle::Running => "running",
            Lifecycle::Closing => "closing",
            Lifecycle::Closed => "closed",
            Lifecycle::Failed => "failed",
        }
    }
}

#[derive(Debug)]
struct LifecycleInner {
    state: Lifecycle,
    startup_error: Option<QueryError>,
}

/// Shared lifecycle state with the startup-complete and terminated
/// conditions.
#[derive(Debug)]
pub struct LifecycleCell {
    inner: Mutex<LifecycleInner>,
    startup: Condvar,
    terminated: Condvar,
}

impl LifecycleCell {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                state: Lifecycle::Created,
                startup_error: None,
            }),
            startup: Condvar::new(),
            terminated: Condvar::new(),
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.inner.lock().state
    }

    pub fn startup_error(&self) -> Option<QueryError> {
        self.inner.lock().startup_error.clone()
    }

    /// Apply a transition if the table allows it. Returns the previous state.
    pub fn transition(&self, next: Lifecycle) -> Result<Lifecycle, Lifecycle> {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        if !previous.can_transition_to(next) {
            return Err(previous);
        }
        inner.state = next;
        debug!(from = previous.as_str(), to = next.as_str(), "Lifecycle transition");
        if next.startup_resolved() {
            self.startup.notify_all();
        }
        if next.is_terminal() {
            self.terminated.notify_all();
        }
        Ok(previous)
    }

    /// Record a construction failure. Ends in `Failed`, or in `Closed` when a
    /// close request arrived during startup.
    pub fn fail_startup(&self, error: QueryError) {
        let mut inner = self.inner.lock();
        inner.startup_error = Some(error);
        let next = if inner.state == Lifecycle::Closing {
            Lifecycle::Closed
        } else {
            Lifecycle::Failed
        };
        if inner.state.can_transition_to(next) {
            inner.state = next;
        } else {
            warn!(state = inner.state.as_str(), "Startup failure recorded in unexpected state");
        }
        self.startup.notify_all();
        self.terminated.notify_all();
    }

    /// Move out of `Created`/`Starting`/`Running` in response to close.
    /// Returns the state that was left, or `None` if close is a no-op.
    pub fn request_close(&self) -> Option<Lifecycle> {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        let next = match previous {
            Lifecycle::Created => Lifecycle::Closed,
            Lifecycle::Starting | Lifecycle::Running => Lifecycle::Closing,
            Lifecycle::Closing | Lifecycle::Closed | Lifecycle::Failed => return None,
        };
        inner.state = next;
        self.startup.notify_all();
        if next.is_terminal() {
            self.terminated.notify_all();
        }
        Some(previous)
    }

    /// Block until startup resolves or `timeout` elapses.
    ///
    /// An expired wait yields a local timeout error; the worker's own outcome
    /// is still recorded when it arrives.
    pub fn await_startup(&self, timeout: Duration, query: &str) -> Result<(), QueryError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.state.startup_resolved() {
            if self.startup.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        if let Some(err) = &inner.startup_error {
            return Err(err.clone());
        }
        match inner.state {
            Lifecycle::Running => Ok(()),
            Lifecycle::Created | Lifecycle::Starting => {
                warn!(query = %query, state = inner.state.as_str(), "Timed out waiting for query thread");
                Err(QueryError::DeadlockTimeout {
                    phase: WaitPhase::Startup,
                    query: query.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                })
            }
            Lifecycle::Closing | Lifecycle::Closed | Lifecycle::Failed => {
                Err(QueryError::NotRunning {
                    query: query.to_string(),
                })
            }
        }
    }

    /// Block until the state is `Closed` or `Failed`. Returns false on
    /// timeout.
    pub fn await_terminated(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.state.is_terminal() {
            if self.terminated.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        inner.state.is_terminal()
    }
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}
