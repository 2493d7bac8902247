//! Worker thread loop
//!
//! The worker opens the engine session, dispatches queued commands one at a
//! time, and releases the session exactly once when the loop ends.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, QuerySpec};
use crate::error::{EngineError, QueryError};
use crate::lifecycle::Lifecycle;
use crate::query::{QueryId, Shared};

pub(crate) fn run<E: Engine>(
    mut engine: E,
    spec: QuerySpec,
    query_id: QueryId,
    shared: Arc<Shared<E::Session>>,
) {
    let query = spec.to_string();
    info!(query_id = query_id.as_u64(), query = %query, "Query thread started");

    let opened = panic::catch_unwind(AssertUnwindSafe(|| engine.open(&spec)))
        .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(&*payload))));
    let mut session = match opened {
        Ok(session) => session,
        Err(err) => {
            warn!(
                query_id = query_id.as_u64(),
                query = %query,
                error = %err,
                "Failed to construct query session"
            );
            let startup_error = QueryError::Construction {
                query: query.clone(),
                source: err,
            };
            shared.lifecycle.fail_startup(startup_error.clone());
            shared.queue.shut_down(&startup_error);
            return;
        }
    };

    match shared.lifecycle.transition(Lifecycle::Running) {
        Ok(_) => {
            debug!(query_id = query_id.as_u64(), "Query session ready");
            if let Err(fault) = dispatch(&shared, &mut session, query_id, &query) {
                error!(
                    query_id = query_id.as_u64(),
                    query = %query,
                    error = %fault,
                    "Query thread aborted"
                );
                shared.lifecycle.request_close();
                if let Some(drained) = shared.queue.shut_down(&fault) {
                    debug!(
                        query_id = query_id.as_u64(),
                        pending = drained.pending,
                        "Propagated fault to queued commands"
                    );
                }
            }
        }
        Err(state) => {
            debug!(
                query_id = query_id.as_u64(),
                state = state.as_str(),
                "Query closed during startup"
            );
        }
    }

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| engine.close(session))) {
        error!(
            query_id = query_id.as_u64(),
            error = %panic_message(&*payload),
            "Engine panicked while releasing query session"
        );
    }
    if let Err(state) = shared.lifecycle.transition(Lifecycle::Closed) {
        warn!(
            query_id = query_id.as_u64(),
            state = state.as_str(),
            "Unexpected state after releasing query session"
        );
    }
    info!(query_id = query_id.as_u64(), query = %query, "Query thread closed");
}

/// Process commands until the queue is shut. Returns the loop-level fault
/// if a command panicked.
fn dispatch<S>(
    shared: &Shared<S>,
    session: &mut S,
    query_id: QueryId,
    query: &str,
) -> Result<(), QueryError> {
    while let Some(mut submission) = shared.queue.next() {
        let name = submission.name();
        let started = Instant::now();
        debug!(
            query_id = query_id.as_u64(),
            command = name,
            command_id = submission.id.as_u64(),
            "Executing command"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            submission.command.execute(session)
        }));

        let result = match outcome {
            Ok(Ok(Some(value))) => Ok(value),
            Ok(Ok(None)) => {
                warn!(
                    query_id = query_id.as_u64(),
                    command = name,
                    "Command yielded no result"
                );
                Err(QueryError::NullResult {
                    command: name,
                    query: query.to_string(),
                })
            }
            Ok(Err(err)) => Err(QueryError::Execution(err)),
            Err(payload) => {
                let fault = QueryError::Execution(EngineError::Panicked(panic_message(&*payload)));
                submission.slot.fill(Err(fault.clone()));
                shared.queue.finish(submission.id);
                return Err(fault);
            }
        };

        let delivered = submission.slot.fill(result);
        shared.queue.finish(submission.id);
        debug!(
            query_id = query_id.as_u64(),
            command = name,
            command_id = submission.id.as_u64(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            delivered,
            "Done executing command"
        );
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
