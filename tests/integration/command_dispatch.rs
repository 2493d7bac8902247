//! Integration tests for command dispatch
//!
//! Tests cover:
//! - Single-writer access to the session under concurrent callers
//! - FIFO execution across caller threads
//! - Null results, execution errors, and custom command values

use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use threaded_query::{
    BuiltinEngine, Command, CommandValue, EngineError, QueryError, ThreadedQuery,
};

use super::test_utils::{quick_config, Block, Fails, StubEngine, StubSession, Record, Silent};

/// Reports the name of the thread it runs on.
pub struct ThreadName;

impl<S> Command<S> for ThreadName {
    fn name(&self) -> &'static str {
        "thread_name"
    }

    fn execute(&mut self, _session: &mut S) -> Result<Option<CommandValue>, EngineError> {
        let name = thread::current().name().unwrap_or_default().to_string();
        Ok(Some(CommandValue::Custom(name.into())))
    }
}

/// Summarizes the stub session as JSON.
struct Snapshot;

impl Command<StubSession> for Snapshot {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn execute(&mut self, session: &mut StubSession) -> Result<Option<CommandValue>, EngineError> {
        use threaded_query::QuerySession;
        let remaining = session.all_solutions()?.len();
        session.reset()?;
        Ok(Some(CommandValue::Custom(json!({ "remaining": remaining }))))
    }
}

fn wait_for_pending(query: &ThreadedQuery<StubEngine>, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while query.pending_commands() < count {
        assert!(Instant::now() < deadline, "commands never queued");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_concurrent_callers_never_overlap() {
    let (engine, stats) = StubEngine::new(vec![1, 2, 3]);
    let query = ThreadedQuery::spawn(engine, "stub", quick_config()).unwrap();

    thread::scope(|scope| {
        for caller in 0..8 {
            let query = &query;
            scope.spawn(move || {
                for step in 0..10 {
                    query
                        .run_command(Record(format!("{}-{}", caller, step)))
                        .unwrap();
                    query.has_more_solutions().unwrap();
                }
            });
        }
    });

    assert_eq!(stats.max_active(), 1);
    assert_eq!(stats.threads().len(), 1);
    assert_eq!(stats.log().len(), 8 * 10 * 2);
    assert_ne!(stats.threads()[0], thread::current().id());
}

#[test]
fn test_commands_run_in_submission_order() {
    let (engine, stats) = StubEngine::new(Vec::new());
    let query = ThreadedQuery::spawn(engine, "stub", quick_config()).unwrap();
    let (block, entered, release) = Block::channels();

    thread::scope(|scope| {
        let query = &query;
        let blocker = scope.spawn(move || query.run_command(block));
        entered.recv().unwrap();

        let mut callers = Vec::new();
        for index in 0..5 {
            callers.push(scope.spawn(move || query.run_command(Record(format!("cmd-{}", index)))));
            wait_for_pending(query, index + 1);
        }

        release.send(()).unwrap();
        assert_eq!(blocker.join().unwrap().unwrap(), CommandValue::Done);
        for caller in callers {
            assert_eq!(caller.join().unwrap().unwrap(), CommandValue::Done);
        }
    });

    let expected: Vec<String> = (0..5).map(|index| format!("cmd-{}", index)).collect();
    assert_eq!(stats.log(), expected);
}

#[test]
fn test_null_result_leaves_query_running() {
    let query = ThreadedQuery::spawn(BuiltinEngine::new(), "true", quick_config()).unwrap();
    match query.run_command(Silent) {
        Err(QueryError::NullResult { command, query }) => {
            assert_eq!(command, "silent");
            assert_eq!(query, "true");
        }
        other => panic!("expected null result, got {:?}", other),
    }
    assert!(query.is_running());
    assert!(query.has_more_solutions().unwrap());
}

#[test]
fn test_engine_errors_are_delivered_to_the_caller() {
    let query = ThreadedQuery::spawn(BuiltinEngine::new(), "true", quick_config()).unwrap();
    let err = query
        .run_command(Fails(EngineError::Instantiation("X".to_string())))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::Execution(EngineError::Instantiation("X".to_string()))
    );
    assert!(query.is_running());
}

#[test]
fn test_instantiation_error_from_builtin_goal() {
    let query =
        ThreadedQuery::spawn(BuiltinEngine::new(), "between(1, N, X)", quick_config()).unwrap();
    assert!(matches!(
        query.next_solution(),
        Err(QueryError::Execution(EngineError::Instantiation(_)))
    ));
}

#[test]
fn test_custom_command_value() {
    let (engine, _stats) = StubEngine::new(vec![4, 5, 6]);
    let query = ThreadedQuery::spawn(engine, "stub", quick_config()).unwrap();
    query.next_solution().unwrap();

    let value = query.run_command(Snapshot).unwrap();
    assert_eq!(value, CommandValue::Custom(json!({ "remaining": 2 })));
    assert_eq!(
        serde_json::to_value(&value).unwrap(),
        json!({ "kind": "custom", "value": { "remaining": 2 } })
    );
    assert_eq!(query.all_solutions().unwrap().len(), 3);
}

#[test]
fn test_shared_query_across_threads_with_arc() {
    let query = Arc::new(
        ThreadedQuery::spawn(BuiltinEngine::new(), "between(1, 50, X)", quick_config()).unwrap(),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let query = Arc::clone(&query);
            thread::spawn(move || {
                let mut taken = 0;
                while let Ok(_solution) = query.next_solution() {
                    taken += 1;
                }
                taken
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 50);
}
