//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use game_sequencer::config::{ExecutorConfig, ServerConfig};
use game_sequencer::core::SchedulerError;

#[test]
fn test_executor_config_defaults() {
    let cfg = ExecutorConfig::default();
    assert_eq!(cfg.max_workers, 1);
    assert_eq!(cfg.keep_alive(), Duration::from_secs(45));
    assert_eq!(cfg.queue_capacity, 0);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_executor_config_invalid_max_workers() {
    let invalid = ExecutorConfig::new().with_max_workers(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_invalid_keep_alive() {
    let invalid = ExecutorConfig::new().with_keep_alive(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_invalid_stack_size() {
    let invalid = ExecutorConfig::new().with_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_server_config_invalid_tick_period() {
    let invalid = ServerConfig {
        tick_period_ms: 0,
        ..ServerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_server_config_nested_executor_error() {
    let invalid = ServerConfig {
        executor: ExecutorConfig::new().with_max_workers(0),
        ..ServerConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.starts_with("executor invalid"));
}

#[test]
fn test_from_json_str_fills_defaults() {
    let json = r#"{
        "name": "world-1",
        "tick_period_ms": 600,
        "executor": { "max_workers": 2 }
    }"#;
    let cfg = ServerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.name, "world-1");
    assert_eq!(cfg.parallel_engine, None);
    assert_eq!(cfg.executor.max_workers, 2);
    assert_eq!(cfg.executor.keep_alive_ms, 45_000);
}

#[test]
fn test_from_json_str_rejects_invalid() {
    let err = ServerConfig::from_json_str(r#"{ "tick_period_ms": 0 }"#).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));

    let err = ServerConfig::from_json_str("not json").unwrap_err();
    assert!(format!("{}", err).contains("parse error"));
}

#[test]
fn test_from_vars_reads_executor_block() {
    let vars: HashMap<&str, &str> = [
        ("GAME_EXECUTOR_KEEP_ALIVE_MS", "1000"),
        ("GAME_EXECUTOR_QUEUE_CAPACITY", "8"),
        ("GAME_EXECUTOR_THREAD_NAME", "offload"),
    ]
    .into_iter()
    .collect();
    let cfg = ServerConfig::from_vars(|k| vars.get(k).map(ToString::to_string)).unwrap();
    assert_eq!(cfg.executor.keep_alive(), Duration::from_secs(1));
    assert_eq!(cfg.executor.queue_capacity, 8);
    assert_eq!(cfg.executor.thread_name, "offload");
}

#[test]
fn test_from_vars_validates_result() {
    let err = ServerConfig::from_vars(|k| (k == "GAME_NAME").then(|| "  ".to_string())).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_config_round_trips_through_json() {
    let cfg = ServerConfig {
        parallel_engine: Some(true),
        ..ServerConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(ServerConfig::from_json_str(&json).unwrap(), cfg);
}
