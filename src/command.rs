//! Query Commands
//!
//! A command is one unit of work executed against a query session on the
//! worker thread. The four built-in commands cover solution enumeration;
//! callers can submit their own by implementing [`Command`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::QuerySession;
use crate::error::EngineError;
use crate::term::Solution;

pub mod slot;

pub use slot::{CommandResult, ResultSlot};

/// Process-unique id of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        CommandId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Value produced by a command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CommandValue {
    Done,
    Bool(bool),
    Solution(Solution),
    Solutions(Vec<Solution>),
    Custom(serde_json::Value),
}

impl CommandValue {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandValue::Done => "done",
            CommandValue::Bool(_) => "bool",
            CommandValue::Solution(_) => "solution",
            CommandValue::Solutions(_) => "solutions",
            CommandValue::Custom(_) => "custom",
        }
    }
}

/// Unit of work run against a session of type `S`.
pub trait Command<S>: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Run against the session. `Ok(None)` means the command produced no
    /// result, which callers see as a null-result error.
    fn execute(&mut self, session: &mut S) -> Result<Option<CommandValue>, EngineError>;
}

/// Restart solution enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reset;

impl<S: QuerySession> Command<S> for Reset {
    fn name(&self) -> &'static str {
        "reset"
    }

    fn execute(&mut self, session: &mut S) -> Result<Option<CommandValue>, EngineError> {
        session.reset()?;
        Ok(Some(CommandValue::Done))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HasMoreSolutions;

impl<S: QuerySession> Command<S> for HasMoreSolutions {
    fn name(&self) -> &'static str {
        "has_more_solutions"
    }

    fn execute(&mut self, session: &mut S) -> Result<Option<CommandValue>, EngineError> {
        Ok(Some(CommandValue::Bool(session.has_more_solutions()?)))
    }
}

/// Fetch one solution; fails with `NoMoreSolutions` once exhausted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextSolution;

impl<S: QuerySession> Command<S> for NextSolution {
    fn name(&self) -> &'static str {
        "next_solution"
    }

    fn execute(&mut self, session: &mut S) -> Result<Option<CommandValue>, EngineError> {
        match session.next_solution()? {
            Some(solution) => Ok(Some(CommandValue::Solution(solution))),
            None => Err(EngineError::NoMoreSolutions),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllSolutions;

impl<S: QuerySession> Command<S> for AllSolutions {
    fn name(&self) -> &'static str {
        "all_solutions"
    }

    fn execute(&mut self, session: &mut S) -> Result<Option<CommandValue>, EngineError> {
        Ok(Some(CommandValue::Solutions(session.all_solutions()?)))
    }
}
