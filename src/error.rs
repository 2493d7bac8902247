//! Error types for threaded query execution.

use std::fmt;
use thiserror::Error;

/// Failures raised by an engine session while a command runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unknown procedure: {name}/{arity}")]
    UnknownProcedure { name: String, arity: usize },

    #[error("Arguments are not sufficiently instantiated: {0}")]
    Instantiation(String),

    #[error("Type error: expected {expected}, found {found}")]
    Type { expected: String, found: String },

    #[error("No more solutions")]
    NoMoreSolutions,

    #[error("Command {command} returned {found}, expected {expected}")]
    UnexpectedValue {
        command: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Command panicked: {0}")]
    Panicked(String),

    #[error("Engine error: {0}")]
    Other(String),
}

/// Which bounded wait expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    Startup,
    Command,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitPhase::Startup => write!(f, "startup"),
            WaitPhase::Command => write!(f, "command"),
        }
    }
}

/// Errors surfaced to callers of a threaded query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Failed to construct query session for {query}: {source}")]
    Construction {
        query: String,
        #[source]
        source: EngineError,
    },

    #[error("Dead lock appeared while waiting for {phase} of {query} ({waited_ms} ms)")]
    DeadlockTimeout {
        phase: WaitPhase,
        query: String,
        waited_ms: u64,
    },

    #[error("Command {command} yielded no result for {query}")]
    NullResult { command: &'static str, query: String },

    #[error("Query closed: {query}")]
    Closed { query: String },

    #[error("Thread not running for query: {query}")]
    NotRunning { query: String },

    #[error(transparent)]
    Execution(#[from] EngineError),
}

impl QueryError {
    /// True for errors caused by the query being closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, QueryError::Closed { .. } | QueryError::NotRunning { .. })
    }

    /// True for synthetic timeouts on a bounded wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::DeadlockTimeout { .. })
    }
}

/// Configuration and logging setup errors
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Configuration validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
}

impl From<config::ConfigError> for SetupError {
    fn from(err: config::ConfigError) -> Self {
        SetupError::Config(err.to_string())
    }
}
