//! Query engine collaborators
//!
//! An [`Engine`] opens one stateful [`QuerySession`] per threaded query. The
//! session is created, used and closed on the worker thread only, so it does
//! not need to be `Send`.

use crate::error::EngineError;
use crate::term::{Solution, Term};
use std::fmt;

pub mod builtin;

pub use builtin::{BuiltinEngine, BuiltinSession};

/// What a threaded query runs: source text or a pre-built term.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    Source(String),
    Term(Term),
}

impl QuerySpec {
    /// Source text, if the query was given as a string.
    pub fn source(&self) -> Option<&str> {
        match self {
            QuerySpec::Source(text) => Some(text.as_str()),
            QuerySpec::Term(_) => None,
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerySpec::Source(text) => write!(f, "{}", text),
            QuerySpec::Term(term) => write!(f, "{}", term),
        }
    }
}

impl From<&str> for QuerySpec {
    fn from(source: &str) -> Self {
        QuerySpec::Source(source.to_string())
    }
}

impl From<String> for QuerySpec {
    fn from(source: String) -> Self {
        QuerySpec::Source(source)
    }
}

impl From<Term> for QuerySpec {
    fn from(term: Term) -> Self {
        QuerySpec::Term(term)
    }
}

/// Factory and releaser for query sessions.
pub trait Engine: Send + 'static {
    type Session: QuerySession + 'static;

    /// Build a session for the query. Called once, on the worker thread.
    fn open(&mut self, spec: &QuerySpec) -> Result<Self::Session, EngineError>;

    /// Release a session. Called at most once per opened session.
    fn close(&mut self, session: Self::Session);
}

/// Solution enumeration over one query.
pub trait QuerySession {
    /// Restart enumeration from the first solution.
    fn reset(&mut self) -> Result<(), EngineError>;

    fn has_more_solutions(&mut self) -> Result<bool, EngineError>;

    /// Next solution, or `None` once the query is exhausted.
    fn next_solution(&mut self) -> Result<Option<Solution>, EngineError>;

    /// Every remaining solution, in order. Exhausts the query.
    fn all_solutions(&mut self) -> Result<Vec<Solution>, EngineError>;
}
