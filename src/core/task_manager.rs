//! Owner of every live task, advanced once per tick.
//!
//! Tasks live in an arena keyed by [`TaskId`]; ids grow monotonically so
//! arena order is submission order. A second index maps each [`TaskKey`] to
//! the ids bound to it, which keeps keyed cancellation proportional to the
//! number of tasks sharing the key.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::core::task::Deferred;
use crate::core::{ScheduledTask, SchedulerError, TaskId, TaskKey};

/// Summary of one [`TaskManager::sequence`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Tick number this report belongs to.
    pub tick: u64,
    /// Tasks evaluated with `needs_execute` (the live set at tick start).
    pub evaluated: usize,
    /// Delay-based executions, successful or not.
    pub executed: usize,
    /// Executions that returned an error or panicked.
    pub failed: usize,
    /// Tasks discarded because they were no longer running.
    pub removed: usize,
    /// Tasks registered during the tick, from other threads or from tasks.
    pub submitted: usize,
}

/// Cloneable handle for submitting tasks from other threads.
///
/// Background work uses this to hand results back to the logic thread; the
/// tasks are registered at the start of the next [`TaskManager::sequence`].
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: Sender<ScheduledTask>,
}

impl TaskSender {
    /// Queue `task` for registration on the logic thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ManagerGone`] if the task manager was dropped.
    pub fn submit(&self, task: ScheduledTask) -> Result<(), SchedulerError> {
        self.tx.send(task).map_err(|_| SchedulerError::ManagerGone)
    }
}

/// Owns, advances and cancels scheduled tasks.
///
/// Not thread-safe by design: it lives on the logic thread. Use
/// [`TaskManager::sender`] to submit from elsewhere.
pub struct TaskManager {
    tasks: BTreeMap<TaskId, ScheduledTask>,
    keys: HashMap<TaskKey, BTreeSet<TaskId>>,
    next_id: TaskId,
    tick: u64,
    deferred: Deferred,
    inbox_tx: Sender<ScheduledTask>,
    inbox_rx: Receiver<ScheduledTask>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = unbounded();
        Self {
            tasks: BTreeMap::new(),
            keys: HashMap::new(),
            next_id: 1,
            tick: 0,
            deferred: Deferred::default(),
            inbox_tx,
            inbox_rx,
        }
    }

    /// Handle for submitting tasks from other threads.
    #[must_use]
    pub fn sender(&self) -> TaskSender {
        TaskSender {
            tx: self.inbox_tx.clone(),
        }
    }

    /// Register `task`, run its `on_submit` hook and, if it is instant,
    /// execute it once right away.
    ///
    /// Ownership of the task moves into the manager, so the same instance can
    /// never be submitted twice.
    pub fn submit(&mut self, task: ScheduledTask) -> TaskId {
        let id = self.register(task);
        self.apply_deferred_submissions();
        id
    }

    /// Advance every task that was live when the call started by one tick.
    ///
    /// Failures are isolated per task: the failing task's `on_error` runs, an
    /// error is logged, and the remaining tasks are still processed. Tasks
    /// submitted while the tick runs are registered after the evaluation pass
    /// and first considered on the next call.
    ///
    /// Tasks handed over through a [`TaskSender`] are registered first. Those
    /// that already fired on registration because they are instant sit out
    /// this call's evaluation pass.
    pub fn sequence(&mut self) -> SequenceReport {
        self.tick += 1;
        let mut report = SequenceReport {
            tick: self.tick,
            ..SequenceReport::default()
        };
        let first_drained = self.next_id;
        report.submitted += self.drain_inbox();

        let live: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(id, task)| **id < first_drained || !task.is_instant())
            .map(|(id, _)| *id)
            .collect();
        report.evaluated = live.len();
        let registered = self.tasks.len();

        for id in live {
            // Gone if a key cancellation earlier in this tick removed it.
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };
            if task.needs_execute() {
                report.executed += 1;
                if !self.fire(id) {
                    report.failed += 1;
                }
            }
            if self.tasks.get(&id).is_some_and(|task| !task.is_running()) {
                self.remove(id);
            }
        }

        let deferred = self.apply_deferred_submissions();
        report.submitted += deferred;
        report.removed = (registered + deferred).saturating_sub(self.tasks.len());

        trace!(
            tick = report.tick,
            evaluated = report.evaluated,
            executed = report.executed,
            failed = report.failed,
            "Task sequence complete"
        );
        report
    }

    /// Cancel every live task bound to `key`.
    ///
    /// Each task's `on_cancel` runs once; the tasks are discarded. Returns the
    /// number of tasks cancelled.
    pub fn cancel(&mut self, key: &TaskKey) -> usize {
        let Some(ids) = self.keys.remove(key) else {
            return 0;
        };
        let mut cancelled = 0;
        for id in ids {
            if let Some(mut task) = self.tasks.remove(&id) {
                if task.is_running() {
                    task.cancel();
                    cancelled += 1;
                }
            }
        }
        debug!(key = %key, cancelled, "Cancelled tasks by key");
        cancelled
    }

    /// Cancel a single task. Returns `false` if it is not live.
    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        match self.remove(id) {
            Some(mut task) => {
                let was_running = task.is_running();
                task.cancel();
                was_running
            }
            None => false,
        }
    }

    /// Cancel every live task. Used at shutdown.
    pub fn cancel_all(&mut self) -> usize {
        self.keys.clear();
        let tasks = std::mem::take(&mut self.tasks);
        let mut cancelled = 0;
        for (_, mut task) in tasks {
            if task.is_running() {
                task.cancel();
                cancelled += 1;
            }
        }
        debug!(cancelled, "Cancelled all tasks");
        cancelled
    }

    /// Live tasks bound to `key`, in submission order.
    pub fn get<'a>(&'a self, key: &TaskKey) -> impl Iterator<Item = &'a ScheduledTask> + 'a {
        self.keys
            .get(key)
            .into_iter()
            .flat_map(move |ids| ids.iter().filter_map(move |id| self.tasks.get(id)))
    }

    /// Live task by id.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&ScheduledTask> {
        self.tasks.get(&id)
    }

    /// All live tasks in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &ScheduledTask)> {
        self.tasks.iter().map(|(id, task)| (*id, task))
    }

    /// Whether `id` is live.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of completed [`TaskManager::sequence`] calls.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    fn register(&mut self, mut task: ScheduledTask) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;

        task.on_submit();
        debug!(
            task_id = id,
            task = %task.name(),
            key = %task.key(),
            delay = task.delay(),
            instant = task.is_instant(),
            "Task submitted"
        );

        let instant = task.is_instant();
        self.keys.entry(task.key().clone()).or_default().insert(id);
        self.tasks.insert(id, task);

        if instant {
            self.fire(id);
            if self.tasks.get(&id).is_some_and(|task| !task.is_running()) {
                self.remove(id);
            }
        }
        id
    }

    /// Execute one task and apply the key cancellations it requested.
    /// Returns `false` if the execution failed.
    fn fire(&mut self, id: TaskId) -> bool {
        let tick = self.tick;
        let Some(task) = self.tasks.get_mut(&id) else {
            return true;
        };
        let succeeded = match task.fire(id, tick, &mut self.deferred) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    task_id = id,
                    task = %task.name(),
                    key = %task.key(),
                    tick,
                    error = %err,
                    "Task execution failed"
                );
                false
            }
        };

        let keys = std::mem::take(&mut self.deferred.key_cancellations);
        for key in keys {
            self.cancel(&key);
        }
        succeeded
    }

    fn remove(&mut self, id: TaskId) -> Option<ScheduledTask> {
        let task = self.tasks.remove(&id)?;
        if let Some(ids) = self.keys.get_mut(task.key()) {
            ids.remove(&id);
            if ids.is_empty() {
                self.keys.remove(task.key());
            }
        }
        Some(task)
    }

    fn drain_inbox(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(task) = self.inbox_rx.try_recv() {
            self.register(task);
            drained += 1;
        }
        drained
    }

    fn apply_deferred_submissions(&mut self) -> usize {
        let mut applied = 0;
        while !self.deferred.is_empty() {
            let submissions = std::mem::take(&mut self.deferred.submissions);
            for key in std::mem::take(&mut self.deferred.key_cancellations) {
                self.cancel(&key);
            }
            for task in submissions {
                self.register(task);
                applied += 1;
            }
        }
        applied
    }
}
