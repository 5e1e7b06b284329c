//! Tests for error types

use game_sequencer::core::{ExecutorError, SchedulerError, SequenceError, TaskError};

#[test]
fn test_negative_delay_error() {
    let err = SchedulerError::NegativeDelay(-4);
    assert_eq!(format!("{}", err), "task delay must be non-negative, got -4");
}

#[test]
fn test_manager_gone_error() {
    let err = SchedulerError::ManagerGone;
    assert_eq!(format!("{}", err), "task manager is no longer accepting tasks");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_workers must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_workers must be greater than 0"
    );
}

#[test]
fn test_task_error_from_scheduler_error_is_transparent() {
    let err: TaskError = SchedulerError::NegativeDelay(-1).into();
    assert!(matches!(err, TaskError::Scheduler(_)));
    assert_eq!(format!("{}", err), "task delay must be non-negative, got -1");
}

#[test]
fn test_task_error_from_anyhow() {
    let err: TaskError = anyhow::anyhow!("item definition missing").into();
    assert_eq!(format!("{}", err), "item definition missing");
}

#[test]
fn test_task_failed_helper() {
    let err = TaskError::failed("no such npc");
    assert_eq!(format!("{}", err), "task failed: no such npc");
}

#[test]
fn test_sequence_errors() {
    assert_eq!(
        format!("{}", SequenceError::Network("reset".into())),
        "network error: reset"
    );
    assert_eq!(
        format!("{}", SequenceError::Panicked("boom".into())),
        "sequence step panicked: boom"
    );
}

#[test]
fn test_executor_errors() {
    assert_eq!(format!("{}", ExecutorError::ShutDown), "executor has been shut down");
    assert_eq!(
        format!("{}", ExecutorError::Abandoned),
        "work was abandoned before it ran"
    );
    assert_eq!(ExecutorError::Timeout, ExecutorError::Timeout);
}

#[test]
fn test_scheduler_error_into_anyhow() {
    fn bootstrap() -> game_sequencer::core::AppResult<()> {
        let submitted: Result<(), SchedulerError> = Err(SchedulerError::ManagerGone);
        submitted?;
        Ok(())
    }
    assert!(bootstrap().is_err());
}
