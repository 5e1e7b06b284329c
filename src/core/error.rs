//! Error types for scheduler, task, tick and executor operations.

use thiserror::Error;

/// Configuration errors raised at the call site. Never silently clamped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A task delay was negative.
    #[error("task delay must be non-negative, got {0}")]
    NegativeDelay(i64),
    /// The task manager behind a sender has been dropped.
    #[error("task manager is no longer accepting tasks")]
    ManagerGone,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure raised by a single task's `execute`.
///
/// Recovered locally by the task manager: the task's `on_error` hook receives
/// it and the rest of the tick carries on.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task reported a failure.
    #[error("task failed: {0}")]
    Failed(String),
    /// The task panicked while executing.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// A scheduling call made from inside the task was rejected.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// Any other error bubbled up from game code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Build a [`TaskError::Failed`] from any message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Tick-level failure raised by one of the fixed sequence steps.
///
/// Aborts the remainder of the tick and triggers the emergency save.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The network pump failed.
    #[error("network error: {0}")]
    Network(String),
    /// The world update failed.
    #[error("world error: {0}")]
    World(String),
    /// Saving participant state failed.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// A sequence step panicked.
    #[error("sequence step panicked: {0}")]
    Panicked(String),
    /// Any other error bubbled up from a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors produced by the background executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor has been shut down and accepts no more work.
    #[error("executor has been shut down")]
    ShutDown,
    /// Waiting for a result timed out.
    #[error("operation timed out")]
    Timeout,
    /// The work panicked.
    #[error("work panicked: {0}")]
    Panicked(String),
    /// The work was dropped without running.
    #[error("work was abandoned before it ran")]
    Abandoned,
    /// The result was already taken from the handle.
    #[error("result already taken")]
    AlreadyTaken,
}

/// Application-facing result using anyhow for bootstrap contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
