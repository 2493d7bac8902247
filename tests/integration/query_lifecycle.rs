//! Integration tests for query lifecycle
//!
//! Tests cover:
//! - Startup handshake and the full solution walk
//! - Construction failures
//! - Idempotent close, close before start, close during startup
//! - Session release on drop

use std::time::{Duration, Instant};
use threaded_query::{
    BuiltinEngine, EngineError, Lifecycle, QueryError, Term, ThreadedQuery, WaitPhase,
};

use super::test_utils::{config_with_timeout, quick_config, StubEngine};

const CLOSE_WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_member_walk_through_builtin_engine() {
    let query =
        ThreadedQuery::spawn(BuiltinEngine::new(), "member(X,[1,2,3])", quick_config()).unwrap();

    query.reset().unwrap();
    assert!(query.has_more_solutions().unwrap());
    let mut seen = Vec::new();
    while query.has_more_solutions().unwrap() {
        seen.push(query.next_solution().unwrap()["X"].clone());
    }
    assert_eq!(
        seen,
        vec![Term::Integer(1), Term::Integer(2), Term::Integer(3)]
    );

    query.reset().unwrap();
    let all = query.all_solutions().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2]["X"], Term::Integer(3));

    query.close();
    assert!(query.wait_until_closed(CLOSE_WAIT));
    assert_eq!(query.state(), Lifecycle::Closed);
}

#[test]
fn test_exhausted_query_reports_no_more_solutions() {
    let query = ThreadedQuery::spawn(BuiltinEngine::new(), "member(X,[a])", quick_config()).unwrap();
    assert_eq!(query.next_solution().unwrap()["X"], Term::atom("a"));
    assert_eq!(
        query.next_solution().unwrap_err(),
        QueryError::Execution(EngineError::NoMoreSolutions)
    );
    // Still usable after an execution error
    query.reset().unwrap();
    assert!(query.has_more_solutions().unwrap());
}

#[test]
fn test_construction_failure_is_reported_to_every_call() {
    let (engine, stats) = StubEngine::failing(EngineError::UnknownProcedure {
        name: "nope".to_string(),
        arity: 0,
    });
    let query = ThreadedQuery::spawn(engine, "nope", quick_config()).unwrap();

    let started = Instant::now();
    for _ in 0..3 {
        match query.has_more_solutions() {
            Err(QueryError::Construction { query, source }) => {
                assert_eq!(query, "nope");
                assert!(matches!(source, EngineError::UnknownProcedure { .. }));
            }
            other => panic!("expected construction error, got {:?}", other),
        }
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(query.state(), Lifecycle::Failed);
    assert!(query.wait_until_closed(CLOSE_WAIT));
    assert_eq!(stats.opened(), 0);
    assert_eq!(stats.closed(), 0);
}

#[test]
fn test_syntax_error_fails_construction() {
    let query =
        ThreadedQuery::spawn(BuiltinEngine::new(), "member(X,[1,2", quick_config()).unwrap();
    let err = query.reset().unwrap_err();
    assert!(matches!(
        err,
        QueryError::Construction {
            source: EngineError::Syntax { .. },
            ..
        }
    ));
}

#[test]
fn test_close_is_idempotent_and_releases_once() {
    let (engine, stats) = StubEngine::new(vec![1, 2]);
    let query = ThreadedQuery::spawn(engine, "stub", quick_config()).unwrap();
    assert!(query.has_more_solutions().unwrap());

    query.close();
    query.close();
    assert!(query.wait_until_closed(CLOSE_WAIT));
    query.close();

    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.closed(), 1);
    assert!(query.reset().unwrap_err().is_closed());
    assert!(query.next_solution().unwrap_err().is_closed());
}

#[test]
fn test_close_before_start_never_opens_session() {
    let (engine, stats) = StubEngine::new(vec![1]);
    let query = ThreadedQuery::with_config(engine, "stub", quick_config());
    query.close();

    assert_eq!(query.state(), Lifecycle::Closed);
    assert!(query.start().unwrap_err().is_closed());
    assert!(query.wait_until_closed(CLOSE_WAIT));
    assert_eq!(stats.opened(), 0);
}

#[test]
fn test_startup_timeout_is_local_to_the_caller() {
    let (engine, stats, release) = StubEngine::gated(vec![7]);
    let query =
        ThreadedQuery::spawn(engine, "stub", config_with_timeout(Duration::from_millis(100)))
            .unwrap();

    let err = query.has_more_solutions().unwrap_err();
    assert!(matches!(
        err,
        QueryError::DeadlockTimeout {
            phase: WaitPhase::Startup,
            waited_ms: 100,
            ..
        }
    ));
    assert_eq!(query.state(), Lifecycle::Starting);

    release.send(()).unwrap();
    assert!(query.has_more_solutions().unwrap());
    assert_eq!(stats.opened(), 1);
}

#[test]
fn test_close_during_startup_releases_session_without_running() {
    let (engine, stats, release) = StubEngine::gated(vec![7]);
    let query = ThreadedQuery::spawn(engine, "stub", quick_config()).unwrap();
    assert_eq!(query.state(), Lifecycle::Starting);

    query.close();
    assert_eq!(query.state(), Lifecycle::Closing);
    drop(release);

    assert!(query.wait_until_closed(CLOSE_WAIT));
    assert_eq!(query.state(), Lifecycle::Closed);
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.closed(), 1);
    assert!(stats.log().is_empty());
}

#[test]
fn test_drop_closes_the_query() {
    let (engine, stats) = StubEngine::new(vec![1]);
    let query = ThreadedQuery::spawn(engine, "stub", quick_config()).unwrap();
    assert!(query.has_more_solutions().unwrap());
    drop(query);

    let deadline = Instant::now() + CLOSE_WAIT;
    while stats.closed() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(stats.closed(), 1);
}

#[test]
fn test_worker_thread_is_named_after_prefix_and_id() {
    let (engine, _stats) = StubEngine::new(vec![1]);
    let query = ThreadedQuery::with_config(engine, "stub", quick_config());
    let expected = format!("test-query-{}", query.id().as_u64());
    query.start().unwrap();

    let name = query.run_command(super::command_dispatch::ThreadName).unwrap();
    assert_eq!(name, threaded_query::CommandValue::Custom(expected.into()));
}
