//! Thread-backed implementation of the background executor.
//!
//! # Design
//!
//! - **One lock**: ready queue, delayed heap and worker counts share a
//!   `parking_lot::Mutex`; workers park on a `Condvar`, no polling
//! - **On-demand workers**: a worker is spawned only when work arrives and no
//!   idle worker can take it; it exits after `keep_alive` without work
//! - **Caller runs**: saturated submissions execute on the submitting thread

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::ExecutorConfig;
use crate::core::error::panic_message;
use crate::core::ExecutorError;

use super::handle::{self, WorkHandle};
use super::{ExecutorCounters, ExecutorStats};

/// Type-erased unit of work. Records its outcome before publishing the result.
type Job = Box<dyn FnOnce(&ExecutorCounters) + Send + 'static>;

/// Work waiting for its due time.
struct Delayed {
    due: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Earliest due first (reversed for max-heap), FIFO among equal due times.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct State {
    ready: VecDeque<Job>,
    delayed: BinaryHeap<Delayed>,
    live_workers: usize,
    idle_workers: usize,
    next_seq: u64,
    next_worker_id: usize,
    shutdown: bool,
}

impl State {
    /// Move delayed work that is due into the ready queue.
    fn promote_due(&mut self, now: Instant) {
        while self.delayed.peek().is_some_and(|d| d.due <= now) {
            if let Some(delayed) = self.delayed.pop() {
                self.ready.push_back(delayed.job);
            }
        }
    }
}

struct Inner {
    config: ExecutorConfig,
    state: Mutex<State>,
    available: Condvar,
    counters: ExecutorCounters,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn run_job(&self, job: Job) {
        job(&self.counters);
    }
}

/// Bounded, self-shrinking worker pool with a caller-runs overload policy.
///
/// Cloning is cheap and every clone drives the same pool. Create it once at
/// bootstrap and call [`BackgroundExecutor::shutdown`] when the server stops.
#[derive(Clone)]
pub struct BackgroundExecutor {
    inner: Arc<Inner>,
}

impl BackgroundExecutor {
    /// Create an executor. No thread is started until work arrives.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`](crate::core::SchedulerError)
    /// if the configuration is invalid.
    pub fn new(config: ExecutorConfig) -> Result<Self, crate::core::SchedulerError> {
        config
            .validate()
            .map_err(crate::core::SchedulerError::InvalidConfig)?;

        info!(
            max_workers = config.max_workers,
            keep_alive_ms = config.keep_alive_ms,
            queue_capacity = config.queue_capacity,
            "Background executor initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                available: Condvar::new(),
                counters: ExecutorCounters::default(),
                workers: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Run `work` off the calling thread if capacity allows, otherwise on it.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::ShutDown`] after [`BackgroundExecutor::shutdown`].
    pub fn submit<F, R>(&self, work: F) -> Result<WorkHandle<R>, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (job, handle) = wrap(work);
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(ExecutorError::ShutDown);
        }
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);

        if state.ready.len() < state.idle_workers {
            state.ready.push_back(job);
            drop(state);
            self.inner.available.notify_one();
            return Ok(handle);
        }

        if state.live_workers < self.inner.config.max_workers {
            state.ready.push_back(job);
            if self.spawn_worker(&mut state) {
                return Ok(handle);
            }
            // Spawning failed: take the work back and fall through to the caller.
            if let Some(job) = state.ready.pop_back() {
                drop(state);
                self.run_on_caller(job);
            }
            return Ok(handle);
        }

        if state.ready.len() < state.idle_workers + self.inner.config.queue_capacity {
            state.ready.push_back(job);
            drop(state);
            self.inner.available.notify_one();
            return Ok(handle);
        }

        drop(state);
        self.run_on_caller(job);
        Ok(handle)
    }

    /// Run `work` once `delay` has elapsed.
    ///
    /// Delayed work is always accepted; the overload policy applies to work
    /// that is due now. Work still waiting at shutdown is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::ShutDown`] after [`BackgroundExecutor::shutdown`].
    pub fn schedule<F, R>(&self, work: F, delay: Duration) -> Result<WorkHandle<R>, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if delay.is_zero() {
            return self.submit(work);
        }

        let (job, handle) = wrap(work);
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(ExecutorError::ShutDown);
        }
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.delayed.push(Delayed {
            due: Instant::now() + delay,
            seq,
            job,
        });
        debug!(seq, delay_ms = delay.as_millis(), "Work scheduled");

        if state.idle_workers > 0 {
            drop(state);
            // Idle workers recompute their wake-up time.
            self.inner.available.notify_all();
        } else if state.live_workers == 0 && !self.spawn_worker(&mut state) {
            error!(seq, "No worker available for scheduled work; it waits for the next worker");
        }
        Ok(handle)
    }

    /// Current utilisation.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        let mut stats = self.inner.counters.snapshot(self.inner.config.max_workers);
        let state = self.inner.state.lock();
        stats.live_workers = state.live_workers;
        stats.idle_workers = state.idle_workers;
        stats.queued = state.ready.len();
        stats.scheduled = state.delayed.len();
        stats
    }

    /// Whether [`BackgroundExecutor::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Stop accepting work, let workers finish queued work, abandon delayed
    /// work and join the workers.
    ///
    /// Each worker gets a bounded wait; a worker still busy afterwards is
    /// detached.
    pub fn shutdown(&self) {
        let abandoned = {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            std::mem::take(&mut state.delayed)
        };
        let abandoned_count = abandoned.len();
        drop(abandoned);
        self.inner
            .counters
            .abandoned
            .fetch_add(abandoned_count as u64, Ordering::Relaxed);
        self.inner.available.notify_all();

        info!(abandoned = abandoned_count, "Shutting down background executor");

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.workers.lock());
        let join_timeout = self.inner.config.join_timeout();
        for worker in workers {
            let name = worker.thread().name().unwrap_or("worker").to_owned();
            let (tx, rx) = crossbeam_channel::bounded(1);
            let joiner = thread::spawn(move || {
                let _ = tx.send(worker.join().is_ok());
            });
            match rx.recv_timeout(join_timeout) {
                Ok(true) => debug!(worker = %name, "Worker joined"),
                Ok(false) => warn!(worker = %name, "Worker panicked"),
                Err(_) => {
                    warn!(worker = %name, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = joiner.join();
        }

        info!("Background executor shut down complete");
    }

    fn run_on_caller(&self, job: Job) {
        self.inner.counters.caller_runs.fetch_add(1, Ordering::Relaxed);
        warn!("Background executor saturated, running work on the calling thread");
        self.inner.run_job(job);
    }

    /// Start one worker. Must be called with the state lock held.
    fn spawn_worker(&self, state: &mut MutexGuard<'_, State>) -> bool {
        let worker_id = state.next_worker_id;
        state.next_worker_id += 1;
        let inner = Arc::clone(&self.inner);

        let spawned = thread::Builder::new()
            .name(format!("{}-{worker_id}", self.inner.config.thread_name))
            .stack_size(self.inner.config.thread_stack_size)
            .spawn(move || worker_loop(worker_id, &inner));

        match spawned {
            Ok(handle) => {
                state.live_workers += 1;
                let mut workers = self.inner.workers.lock();
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
                debug!(worker_id, live_workers = state.live_workers, "Worker spawned");
                true
            }
            Err(e) => {
                error!(worker_id, error = %e, "Failed to spawn background worker");
                false
            }
        }
    }
}

impl std::fmt::Debug for BackgroundExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundExecutor")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Wrap user work so panics are caught and the result lands in the handle.
fn wrap<F, R>(work: F) -> (Job, WorkHandle<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (completer, handle) = handle::pair();
    let job: Job = Box::new(move |counters: &ExecutorCounters| {
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(value) => {
                counters.record(true);
                completer.complete(Ok(value));
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(panic = %msg, "Offloaded work panicked");
                counters.record(false);
                completer.complete(Err(ExecutorError::Panicked(msg)));
            }
        }
    });
    (job, handle)
}

fn worker_loop(worker_id: usize, inner: &Inner) {
    debug!(worker_id, "Worker thread started");
    let keep_alive = inner.config.keep_alive();
    let mut idle_since = Instant::now();
    let mut state = inner.state.lock();

    loop {
        let now = Instant::now();
        state.promote_due(now);

        if let Some(job) = state.ready.pop_front() {
            MutexGuard::unlocked(&mut state, || inner.run_job(job));
            idle_since = Instant::now();
            continue;
        }

        if state.shutdown {
            break;
        }

        let idle_deadline = idle_since + keep_alive;
        let wake_at = match state.delayed.peek() {
            // Pending delayed work keeps the worker alive.
            Some(next) => next.due,
            None if now >= idle_deadline => {
                debug!(worker_id, "Worker idle past keep-alive, exiting");
                break;
            }
            None => idle_deadline,
        };

        state.idle_workers += 1;
        inner.available.wait_until(&mut state, wake_at);
        state.idle_workers -= 1;
    }

    state.live_workers -= 1;
    debug!(worker_id, live_workers = state.live_workers, "Worker thread exiting");
}
