//! Threaded Query
//!
//! A query whose engine session lives on one dedicated worker thread. Any
//! number of caller threads use the synchronous methods below; each call
//! becomes a command on the worker's queue and blocks, with a bounded wait,
//! for that command's result.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::command::{
    AllSolutions, Command, CommandValue, HasMoreSolutions, NextSolution, Reset,
};
use crate::config::WorkerConfig;
use crate::engine::{Engine, QuerySpec};
use crate::error::{EngineError, QueryError, WaitPhase};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::term::Solution;

pub mod queue;
mod worker;

use queue::{CommandQueue, Submission};

/// Process-unique id of a threaded query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

impl QueryId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        QueryId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// State touched by both the worker and callers.
pub(crate) struct Shared<S> {
    pub(crate) lifecycle: LifecycleCell,
    pub(crate) queue: CommandQueue<S>,
}

pub struct ThreadedQuery<E: Engine> {
    id: QueryId,
    spec: QuerySpec,
    label: String,
    config: WorkerConfig,
    engine: Mutex<Option<E>>,
    shared: Arc<Shared<E::Session>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Engine> ThreadedQuery<E> {
    /// Create a query with default worker settings. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(engine: E, spec: impl Into<QuerySpec>) -> Self {
        Self::with_config(engine, spec, WorkerConfig::default())
    }

    pub fn with_config(engine: E, spec: impl Into<QuerySpec>, config: WorkerConfig) -> Self {
        let spec = spec.into();
        Self {
            id: QueryId::next(),
            label: spec.to_string(),
            spec,
            config,
            engine: Mutex::new(Some(engine)),
            shared: Arc::new(Shared {
                lifecycle: LifecycleCell::new(),
                queue: CommandQueue::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Create and start a query.
    pub fn spawn(
        engine: E,
        spec: impl Into<QuerySpec>,
        config: WorkerConfig,
    ) -> Result<Self, QueryError> {
        let query = Self::with_config(engine, spec, config);
        query.start()?;
        Ok(query)
    }

    /// Spawn the worker thread. Fails if the query was already started or
    /// closed.
    pub fn start(&self) -> Result<(), QueryError> {
        if let Err(state) = self.shared.lifecycle.transition(Lifecycle::Starting) {
            debug!(query_id = self.id.as_u64(), state = state.as_str(), "Start refused");
            return Err(self.not_running());
        }

        let Some(engine) = self.engine.lock().take() else {
            let error = self.construction_error("engine already taken".to_string());
            self.shared.lifecycle.fail_startup(error.clone());
            return Err(error);
        };

        let shared = Arc::clone(&self.shared);
        let spec = self.spec.clone();
        let id = self.id;
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name_prefix, id.as_u64()))
            .spawn(move || worker::run(engine, spec, id, shared));

        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                let error = self.construction_error(format!("failed to spawn query thread: {}", err));
                self.shared.lifecycle.fail_startup(error.clone());
                Err(error)
            }
        }
    }

    /// Submit a command and block until it completes, fails, or the command
    /// timeout elapses.
    pub fn run_command<C>(&self, command: C) -> Result<CommandValue, QueryError>
    where
        C: Command<E::Session> + 'static,
    {
        self.shared
            .lifecycle
            .await_startup(self.config.startup_timeout(), &self.label)?;

        let submission = Submission::new(Box::new(command));
        let name = submission.name();
        let command_id = submission.id;
        let slot = Arc::clone(&submission.slot);

        if self.shared.queue.push(submission).is_err() {
            return Err(self.not_running());
        }
        debug!(
            query_id = self.id.as_u64(),
            command = name,
            command_id = command_id.as_u64(),
            "Pushed command"
        );

        let timeout = self.config.command_timeout();
        slot.wait(timeout, || {
            warn!(
                query_id = self.id.as_u64(),
                command = name,
                command_id = command_id.as_u64(),
                timeout_ms = timeout.as_millis() as u64,
                "Timed out waiting for command"
            );
            QueryError::DeadlockTimeout {
                phase: WaitPhase::Command,
                query: self.label.clone(),
                waited_ms: timeout.as_millis() as u64,
            }
        })
    }

    pub fn reset(&self) -> Result<(), QueryError> {
        match self.run_command(Reset)? {
            CommandValue::Done => Ok(()),
            other => Err(unexpected("reset", "done", &other)),
        }
    }

    pub fn has_more_solutions(&self) -> Result<bool, QueryError> {
        match self.run_command(HasMoreSolutions)? {
            CommandValue::Bool(more) => Ok(more),
            other => Err(unexpected("has_more_solutions", "bool", &other)),
        }
    }

    pub fn next_solution(&self) -> Result<Solution, QueryError> {
        match self.run_command(NextSolution)? {
            CommandValue::Solution(solution) => Ok(solution),
            other => Err(unexpected("next_solution", "solution", &other)),
        }
    }

    pub fn all_solutions(&self) -> Result<Vec<Solution>, QueryError> {
        match self.run_command(AllSolutions)? {
            CommandValue::Solutions(solutions) => Ok(solutions),
            other => Err(unexpected("all_solutions", "solutions", &other)),
        }
    }

    /// Shut the query down. Queued commands and the one in flight are
    /// resolved with a closed error; the in-flight engine call itself is not
    /// interrupted. Calling close again does nothing.
    pub fn close(&self) {
        let Some(previous) = self.shared.lifecycle.request_close() else {
            return;
        };
        if previous == Lifecycle::Created {
            self.engine.lock().take();
        }

        let error = QueryError::Closed {
            query: self.label.clone(),
        };
        if let Some(drained) = self.shared.queue.shut_down(&error) {
            if drained.in_flight > 0 {
                warn!(
                    query_id = self.id.as_u64(),
                    query = %self.label,
                    "Aborted query thread before command finished"
                );
            }
            info!(
                query_id = self.id.as_u64(),
                from = previous.as_str(),
                aborted_pending = drained.pending,
                aborted_in_flight = drained.in_flight,
                "Closed query"
            );
        }
    }

    /// Wait until the worker has released the session and exited. Returns
    /// false if that did not happen within `timeout`.
    pub fn wait_until_closed(&self, timeout: Duration) -> bool {
        if !self.shared.lifecycle.await_terminated(timeout) {
            return false;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!(query_id = self.id.as_u64(), "Query thread panicked on exit");
            }
        }
        true
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn query_string(&self) -> Option<&str> {
        self.spec.source()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> Lifecycle {
        self.shared.lifecycle.state()
    }

    pub fn is_started(&self) -> bool {
        self.state() != Lifecycle::Created
    }

    pub fn is_running(&self) -> bool {
        self.state() == Lifecycle::Running
    }

    /// Commands queued and not yet picked up by the worker.
    pub fn pending_commands(&self) -> usize {
        self.shared.queue.len()
    }

    fn not_running(&self) -> QueryError {
        QueryError::NotRunning {
            query: self.label.clone(),
        }
    }

    fn construction_error(&self, reason: String) -> QueryError {
        QueryError::Construction {
            query: self.label.clone(),
            source: EngineError::Other(reason),
        }
    }
}

impl<E: Engine> Drop for ThreadedQuery<E> {
    fn drop(&mut self) {
        self.close();
    }
}

fn unexpected(command: &'static str, expected: &'static str, found: &CommandValue) -> QueryError {
    QueryError::Execution(EngineError::UnexpectedValue {
        command,
        expected,
        found: found.kind(),
    })
}
