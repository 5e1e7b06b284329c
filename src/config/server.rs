//! Server and background executor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Prefix of every environment variable read by [`ServerConfig::from_env`].
pub const ENV_PREFIX: &str = "GAME_";

/// Background executor sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum worker threads.
    pub max_workers: usize,
    /// Milliseconds an idle worker waits for work before exiting.
    pub keep_alive_ms: u64,
    /// Work allowed to wait for a busy worker before the caller runs it.
    pub queue_capacity: usize,
    /// Worker thread name prefix.
    pub thread_name: String,
    /// Worker thread stack size in bytes.
    pub thread_stack_size: usize,
    /// Milliseconds to wait for each worker when shutting down.
    pub join_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            keep_alive_ms: 45_000,
            queue_capacity: 0,
            thread_name: "logic-service".into(),
            thread_stack_size: 2 * 1024 * 1024,
            join_timeout_ms: 2_000,
        }
    }
}

impl ExecutorConfig {
    /// Default configuration: one worker, 45 second keep-alive, no queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker ceiling.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the idle keep-alive.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set how much work may wait for a busy worker.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the worker stack size in bytes.
    #[must_use]
    pub const fn with_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Idle keep-alive as a duration.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Per-worker shutdown wait as a duration.
    #[must_use]
    pub const fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Validate executor configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if self.keep_alive_ms == 0 {
            return Err("keep_alive_ms must be greater than 0".into());
        }
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

/// Root server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name, used in logs and status output.
    pub name: String,
    /// Milliseconds between ticks.
    pub tick_period_ms: u64,
    /// Whether the parallel engine is enabled. Resolved from the CPU count
    /// when unset.
    ///
    /// Advisory only: the sequencer never reads it. It is reported in status
    /// output for the network and world layers to consult.
    pub parallel_engine: Option<bool>,
    /// Background executor sizing.
    pub executor: ExecutorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "game-server".into(),
            tick_period_ms: 600,
            parallel_engine: None,
            executor: ExecutorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Tick period as a duration.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Whether the parallel engine should run: the configured value, or
    /// `true` on machines with more than one logical CPU.
    ///
    /// The resolved flag does not change how ticks are run.
    #[must_use]
    pub fn resolve_parallel_engine(&self) -> bool {
        self.parallel_engine.unwrap_or_else(|| num_cpus::get() > 1)
    }

    /// Validate server configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.tick_period_ms == 0 {
            return Err("tick_period_ms must be greater than 0".into());
        }
        self.executor
            .validate()
            .map_err(|e| format!("executor invalid: {e}"))
    }

    /// Parse server configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] on parse or validation
    /// failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, after reading a
    /// `.env` file if one exists.
    ///
    /// Starts from the defaults and overrides fields from `GAME_NAME`,
    /// `GAME_TICK_PERIOD_MS`, `GAME_PARALLEL_ENGINE`,
    /// `GAME_EXECUTOR_MAX_WORKERS`, `GAME_EXECUTOR_KEEP_ALIVE_MS`,
    /// `GAME_EXECUTOR_QUEUE_CAPACITY` and `GAME_EXECUTOR_THREAD_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if a variable does not parse
    /// or the result fails validation.
    pub fn from_env() -> Result<Self, SchedulerError> {
        // A missing .env file is normal in production.
        let _ = dotenvy::dotenv();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an explicit variable source.
    ///
    /// `lookup` receives full variable names, prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if a variable does not parse
    /// or the result fails validation.
    pub fn from_vars<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();

        if let Some(name) = var("NAME") {
            cfg.name = name;
        }
        if let Some(raw) = var("TICK_PERIOD_MS") {
            cfg.tick_period_ms = parse_var("TICK_PERIOD_MS", &raw)?;
        }
        if let Some(raw) = var("PARALLEL_ENGINE") {
            cfg.parallel_engine = Some(parse_var("PARALLEL_ENGINE", &raw)?);
        }
        if let Some(raw) = var("EXECUTOR_MAX_WORKERS") {
            cfg.executor.max_workers = parse_var("EXECUTOR_MAX_WORKERS", &raw)?;
        }
        if let Some(raw) = var("EXECUTOR_KEEP_ALIVE_MS") {
            cfg.executor.keep_alive_ms = parse_var("EXECUTOR_KEEP_ALIVE_MS", &raw)?;
        }
        if let Some(raw) = var("EXECUTOR_QUEUE_CAPACITY") {
            cfg.executor.queue_capacity = parse_var("EXECUTOR_QUEUE_CAPACITY", &raw)?;
        }
        if let Some(name) = var("EXECUTOR_THREAD_NAME") {
            cfg.executor.thread_name = name;
        }

        cfg.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(cfg)
    }
}

fn parse_var<T>(suffix: &str, raw: &str) -> Result<T, SchedulerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        SchedulerError::InvalidConfig(format!("{ENV_PREFIX}{suffix}={raw:?}: {e}"))
    })
}
