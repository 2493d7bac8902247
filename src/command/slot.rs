//! Write-once result slot shared between a caller and the worker.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::command::CommandValue;
use crate::error::QueryError;

pub type CommandResult = Result<CommandValue, QueryError>;

#[derive(Debug)]
enum SlotState {
    Pending,
    Ready(CommandResult),
    Delivered,
}

/// Single-assignment result of one submitted command.
///
/// The first `fill` wins; later fills are ignored. The waiting caller takes
/// the result out exactly once.
#[derive(Debug)]
pub struct ResultSlot {
    state: Mutex<SlotState>,
    completed: Condvar,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            completed: Condvar::new(),
        }
    }

    /// Store a result and wake the waiter. Returns false if the slot was
    /// already resolved.
    pub fn fill(&self, result: CommandResult) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, SlotState::Pending) {
            return false;
        }
        *state = SlotState::Ready(result);
        self.completed.notify_all();
        true
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(*self.state.lock(), SlotState::Pending)
    }

    /// Block until the slot is filled or `timeout` elapses. On expiry the
    /// slot is filled with the error built by `on_timeout`, so a late result
    /// from the worker is discarded.
    pub fn wait<F>(&self, timeout: Duration, on_timeout: F) -> CommandResult
    where
        F: FnOnce() -> QueryError,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while matches!(*state, SlotState::Pending) {
            if self.completed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        match std::mem::replace(&mut *state, SlotState::Delivered) {
            SlotState::Ready(result) => result,
            SlotState::Pending => Err(on_timeout()),
            SlotState::Delivered => Err(on_timeout()),
        }
    }
}

impl Default for ResultSlot {
    fn default() -> Self {
        Self::new()
    }
}
