//! The unit of work driven by the task manager.
//!
//! A [`Task`] supplies behaviour; a [`ScheduledTask`] wraps it with the
//! scheduling state the manager needs: a tick delay, an elapsed-tick counter,
//! the instant flag, a grouping key and the liveness flag. Timing is measured
//! purely in ticks, so cadence is whatever rate the manager is driven at.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::core::error::{panic_message, SchedulerError, TaskError};
use crate::core::TaskKey;

/// Identifier assigned to a task when the manager accepts it.
///
/// Identifiers increase monotonically, so ordering by id is submission order.
pub type TaskId = u64;

/// Behaviour of a scheduled task.
///
/// Only [`execute`](Task::execute) is required. The hooks default to no-ops.
///
/// # Example
///
/// ```rust
/// use game_sequencer::core::{ScheduledTask, Task, TaskContext, TaskError};
///
/// struct RestoreStats {
///     remaining: u32,
/// }
///
/// impl Task for RestoreStats {
///     fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
///         self.remaining -= 1;
///         if self.remaining == 0 {
///             ctx.cancel();
///         }
///         Ok(())
///     }
/// }
///
/// let task = ScheduledTask::new(100, false, RestoreStats { remaining: 5 }).unwrap();
/// assert!(task.is_running());
/// ```
pub trait Task: Send {
    /// The action performed each time the task fires.
    ///
    /// Returning an error (or panicking) is reported to
    /// [`on_error`](Task::on_error); the task stays scheduled unless it cancels
    /// itself through the context.
    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), TaskError>;

    /// Invoked once when the manager accepts the task, before any execution.
    fn on_submit(&mut self) {}

    /// Invoked once when a running task is cancelled.
    fn on_cancel(&mut self) {}

    /// Invoked when `execute` fails.
    fn on_error(&mut self, _error: &TaskError) {}

    /// Name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Work requested by tasks that must be applied outside their own `execute`.
#[derive(Default)]
pub(crate) struct Deferred {
    /// Tasks submitted from inside `execute`.
    pub submissions: Vec<ScheduledTask>,
    /// Keys whose tasks must be cancelled.
    pub key_cancellations: Vec<TaskKey>,
}

impl Deferred {
    pub(crate) fn is_empty(&self) -> bool {
        self.submissions.is_empty() && self.key_cancellations.is_empty()
    }
}

/// View of the scheduler handed to a task while it executes.
pub struct TaskContext<'a> {
    tick: u64,
    task_id: TaskId,
    key: &'a TaskKey,
    delay: u64,
    cancel_requested: bool,
    new_delay: Option<u64>,
    deferred: &'a mut Deferred,
}

impl TaskContext<'_> {
    /// Number of the tick being processed.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Identifier of the executing task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Key of the executing task.
    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        self.key
    }

    /// Current delay of the executing task, including any change made during
    /// this execution.
    #[must_use]
    pub fn delay(&self) -> u64 {
        self.new_delay.unwrap_or(self.delay)
    }

    /// Cancel the executing task once `execute` returns.
    pub fn cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Whether the executing task asked to be cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancel_requested
    }

    /// Change the executing task's delay without resetting its counter.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NegativeDelay`] if `delay` is negative.
    pub fn set_delay(&mut self, delay: i64) -> Result<(), SchedulerError> {
        self.new_delay = Some(checked_delay(delay)?);
        Ok(())
    }

    /// Submit a follow-up task. It is registered once the current tick's
    /// evaluation finishes and first considered for delay-based firing on the
    /// next tick.
    pub fn submit(&mut self, task: ScheduledTask) {
        self.deferred.submissions.push(task);
    }

    /// Cancel every live task bound to `key`, including the executing task if
    /// it shares the key. Applied as soon as `execute` returns.
    pub fn cancel_key(&mut self, key: impl Into<TaskKey>) {
        self.deferred.key_cancellations.push(key.into());
    }
}

/// A task together with its scheduling state.
pub struct ScheduledTask {
    delay: u64,
    counter: u64,
    instant: bool,
    key: TaskKey,
    running: bool,
    task: Box<dyn Task>,
}

impl ScheduledTask {
    /// Wrap `task` so it fires every `delay` ticks, and once on submission if
    /// `instant` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NegativeDelay`] if `delay` is negative.
    pub fn new<T>(delay: i64, instant: bool, task: T) -> Result<Self, SchedulerError>
    where
        T: Task + 'static,
    {
        Self::boxed(delay, instant, Box::new(task))
    }

    /// Same as [`ScheduledTask::new`] for an already boxed task.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NegativeDelay`] if `delay` is negative.
    pub fn boxed(delay: i64, instant: bool, task: Box<dyn Task>) -> Result<Self, SchedulerError> {
        Ok(Self {
            delay: checked_delay(delay)?,
            counter: 0,
            instant,
            key: TaskKey::DEFAULT,
            running: true,
            task,
        })
    }

    /// Build a task from a closure.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NegativeDelay`] if `delay` is negative.
    pub fn from_fn<F>(delay: i64, instant: bool, f: F) -> Result<Self, SchedulerError>
    where
        F: FnMut(&mut TaskContext<'_>) -> Result<(), TaskError> + Send + 'static,
    {
        Self::new(delay, instant, TaskFn { f })
    }

    /// Bind this task to `key`, replacing its current key.
    #[must_use]
    pub fn attach(mut self, key: impl Into<TaskKey>) -> Self {
        self.key = key.into();
        self
    }

    /// Change the delay without resetting the elapsed-tick counter.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NegativeDelay`] if `delay` is negative; the
    /// current delay is left untouched.
    pub fn set_delay(&mut self, delay: i64) -> Result<(), SchedulerError> {
        self.delay = checked_delay(delay)?;
        Ok(())
    }

    /// Advance the elapsed-tick counter and report whether the task fires now.
    ///
    /// Fires when the counter has reached the delay and the task is running,
    /// resetting the counter.
    pub fn needs_execute(&mut self) -> bool {
        self.counter = self.counter.saturating_add(1);
        if self.counter >= self.delay && self.running {
            self.counter = 0;
            return true;
        }
        false
    }

    /// Stop the task. Idempotent; `on_cancel` runs only on the first call.
    pub fn cancel(&mut self) {
        if self.running {
            self.running = false;
            let task = &mut self.task;
            guard_hook(task.name().to_owned(), "on_cancel", || task.on_cancel());
        }
    }

    /// Whether the task fires when submitted.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        self.instant
    }

    /// The task's grouping key.
    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Whether the task is still live.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Ticks between firings.
    #[must_use]
    pub const fn delay(&self) -> u64 {
        self.delay
    }

    /// Name of the wrapped behaviour.
    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub(crate) fn on_submit(&mut self) {
        let task = &mut self.task;
        guard_hook(task.name().to_owned(), "on_submit", || task.on_submit());
    }

    /// Run `execute` once, isolating failures.
    ///
    /// Panics become [`TaskError::Panicked`]. On failure `on_error` runs before
    /// the error is returned. Context requests (delay change, cancellation) are
    /// applied afterwards, whatever the outcome.
    pub(crate) fn fire(
        &mut self,
        task_id: TaskId,
        tick: u64,
        deferred: &mut Deferred,
    ) -> Result<(), TaskError> {
        let mut ctx = TaskContext {
            tick,
            task_id,
            key: &self.key,
            delay: self.delay,
            cancel_requested: false,
            new_delay: None,
            deferred,
        };
        let task = &mut self.task;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.execute(&mut ctx)))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
        let TaskContext {
            cancel_requested,
            new_delay,
            ..
        } = ctx;

        if let Some(delay) = new_delay {
            self.delay = delay;
        }
        if let Err(ref err) = outcome {
            let task = &mut self.task;
            guard_hook(task.name().to_owned(), "on_error", || task.on_error(err));
        }
        if cancel_requested {
            self.cancel();
        }
        outcome
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.task.name())
            .field("delay", &self.delay)
            .field("counter", &self.counter)
            .field("instant", &self.instant)
            .field("key", &self.key)
            .field("running", &self.running)
            .finish()
    }
}

/// Closure-backed task produced by [`ScheduledTask::from_fn`].
struct TaskFn<F> {
    f: F,
}

impl<F> Task for TaskFn<F>
where
    F: FnMut(&mut TaskContext<'_>) -> Result<(), TaskError> + Send,
{
    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
        (self.f)(ctx)
    }

    fn name(&self) -> &str {
        "task_fn"
    }
}

fn checked_delay(delay: i64) -> Result<u64, SchedulerError> {
    u64::try_from(delay).map_err(|_| SchedulerError::NegativeDelay(delay))
}

/// Run a lifecycle hook; a panicking hook is logged and swallowed.
fn guard_hook(name: String, hook: &'static str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        error!(
            task = %name,
            hook,
            panic = %panic_message(payload.as_ref()),
            "Task lifecycle hook panicked"
        );
    }
}
