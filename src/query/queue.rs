//! Command queue between caller threads and the worker.
//!
//! Strict FIFO. The queue also tracks the command the worker is executing so
//! that shutdown can resolve it, and it never holds that command itself.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::command::{Command, CommandId, ResultSlot};
use crate::error::QueryError;

/// A command waiting for the worker, with the slot its caller blocks on.
pub struct Submission<S> {
    pub id: CommandId,
    pub command: Box<dyn Command<S>>,
    pub slot: Arc<ResultSlot>,
}

impl<S> Submission<S> {
    pub fn new(command: Box<dyn Command<S>>) -> Self {
        Self {
            id: CommandId::next(),
            command,
            slot: Arc::new(ResultSlot::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.command.name()
    }
}

struct QueueState<S> {
    pending: VecDeque<Submission<S>>,
    current: Option<(CommandId, Arc<ResultSlot>)>,
    shut: bool,
}

/// Counts of commands resolved by a shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    pub pending: usize,
    pub in_flight: usize,
}

pub struct CommandQueue<S> {
    state: Mutex<QueueState<S>>,
    work_ready: Condvar,
}

impl<S> CommandQueue<S> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                current: None,
                shut: false,
            }),
            work_ready: Condvar::new(),
        }
    }

    /// Append a submission and wake the worker. Hands the submission back if
    /// the queue has been shut.
    pub fn push(&self, submission: Submission<S>) -> Result<(), Submission<S>> {
        let mut state = self.state.lock();
        if state.shut {
            return Err(submission);
        }
        state.pending.push_back(submission);
        self.work_ready.notify_one();
        Ok(())
    }

    /// Block until a submission is available and mark it current. Returns
    /// `None` once the queue is shut.
    pub fn next(&self) -> Option<Submission<S>> {
        let mut state = self.state.lock();
        loop {
            if state.shut {
                return None;
            }
            if let Some(submission) = state.pending.pop_front() {
                state.current = Some((submission.id, Arc::clone(&submission.slot)));
                return Some(submission);
            }
            self.work_ready.wait(&mut state);
        }
    }

    pub fn finish(&self, id: CommandId) {
        let mut state = self.state.lock();
        if matches!(state.current, Some((current, _)) if current == id) {
            state.current = None;
        }
    }

    /// Stop accepting work. Every queued submission and the in-flight one
    /// (if any) are resolved with `error` unless already resolved. Only the
    /// first call does anything.
    pub fn shut_down(&self, error: &QueryError) -> Option<Drained> {
        let mut state = self.state.lock();
        if state.shut {
            return None;
        }
        state.shut = true;
        let mut drained = Drained::default();
        for submission in state.pending.drain(..) {
            if submission.slot.fill(Err(error.clone())) {
                drained.pending += 1;
            }
        }
        if let Some((_, slot)) = state.current.take() {
            if slot.fill(Err(error.clone())) {
                drained.in_flight += 1;
            }
        }
        self.work_ready.notify_all();
        Some(drained)
    }

    pub fn is_shut(&self) -> bool {
        self.state.lock().shut
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Default for CommandQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}
