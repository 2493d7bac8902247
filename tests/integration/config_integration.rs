//! Integration tests for configuration and logging setup

use std::time::Duration;
use tempfile::TempDir;
use threaded_query::logging::{init_logging, LoggingConfig};
use threaded_query::{BuiltinEngine, ConfigLoader, SetupError, ThreadedQuery, WorkerConfig};

#[test]
fn test_loaded_worker_config_drives_query() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("query.toml");
    std::fs::write(
        &config_file,
        r#"
[worker]
startup_timeout_ms = 4000
command_timeout_ms = 4000
thread_name_prefix = "configured"

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.worker.command_timeout(), Duration::from_secs(4));
    assert_eq!(config.logging.format, "json");

    let query = ThreadedQuery::spawn(BuiltinEngine::new(), "length([a, b], N)", config.worker)
        .unwrap();
    assert_eq!(query.config().thread_name_prefix, "configured");
    let solutions = query.all_solutions().unwrap();
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0]["N"].to_string(), "2");
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("query.toml");
    std::fs::write(
        &config_file,
        "[worker]\nstartup_timeout_ms = 0\n\n[logging]\noutput = \"printer\"\n",
    )
    .unwrap();

    match ConfigLoader::load_from_file(&config_file) {
        Err(SetupError::Validation(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors[0].contains("startup_timeout_ms"));
            assert!(errors[1].contains("printer"));
        }
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(SetupError::Config(_))));
}

#[test]
fn test_logging_initializes_once() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        output: "stderr".to_string(),
        ..LoggingConfig::default()
    };
    assert!(init_logging(Some(&config)).is_ok());
    assert!(matches!(
        init_logging(Some(&config)),
        Err(SetupError::Logging(_))
    ));

    let query = ThreadedQuery::spawn(
        BuiltinEngine::new(),
        "true",
        WorkerConfig::with_timeout(Duration::from_secs(5)),
    )
    .unwrap();
    assert!(query.has_more_solutions().unwrap());
}
