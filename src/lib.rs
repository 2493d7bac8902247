//! Threaded Query: single-owner worker threads for engine sessions
//!
//! An engine session that must only be touched by one thread is opened on a
//! dedicated worker. Callers on any thread drive it through a FIFO command
//! queue with bounded waits, so a stuck engine surfaces as a timeout error
//! instead of a hung caller.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod query;
pub mod term;

pub use command::{Command, CommandValue};
pub use config::{ConfigLoader, QueryServiceConfig, WorkerConfig};
pub use engine::{BuiltinEngine, Engine, QuerySession, QuerySpec};
pub use error::{EngineError, QueryError, SetupError, WaitPhase};
pub use lifecycle::Lifecycle;
pub use query::{QueryId, ThreadedQuery};
pub use term::{Solution, Term};
