//! Background executor for work that must not run on the logic thread.
//!
//! The executor is a small pool of OS threads sized for rare, low-priority
//! offloaded work (slow lookups, file or network I/O). Workers are started on
//! demand and exit once they have been idle for the configured keep-alive, so
//! an idle server holds no extra threads.
//!
//! # Overload policy
//!
//! Work is never dropped. When no worker is idle, no more workers may be
//! started and the queue has no room, the submitting thread runs the work
//! itself before `submit` returns.
//!
//! # Example
//!
//! ```rust
//! use game_sequencer::config::ExecutorConfig;
//! use game_sequencer::core::BackgroundExecutor;
//!
//! let executor = BackgroundExecutor::new(ExecutorConfig::default()).unwrap();
//! let handle = executor.submit(|| 6 * 7).unwrap();
//! assert_eq!(handle.wait().unwrap(), 42);
//! executor.shutdown();
//! ```
//!
//! Offloaded work must not touch game state directly. Hand results back to the
//! logic thread through a [`TaskSender`](crate::core::TaskSender) instead.

mod handle;
mod native;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub use handle::WorkHandle;
pub use native::BackgroundExecutor;

/// Snapshot of executor utilisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorStats {
    /// Configured worker ceiling.
    pub max_workers: usize,
    /// Worker threads currently alive.
    pub live_workers: usize,
    /// Workers waiting for work.
    pub idle_workers: usize,
    /// Work waiting for a worker.
    pub queued: usize,
    /// Delayed work not yet due.
    pub scheduled: usize,
    /// Total work accepted.
    pub submitted: u64,
    /// Total work finished, on workers or callers, including panics.
    pub completed: u64,
    /// Work that panicked.
    pub panicked: u64,
    /// Work run synchronously on the submitting thread.
    pub caller_runs: u64,
    /// Delayed work dropped at shutdown.
    pub abandoned: u64,
}

/// Lifetime counters (lock-free).
#[derive(Debug, Default)]
pub(crate) struct ExecutorCounters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
    pub caller_runs: AtomicU64,
    pub abandoned: AtomicU64,
}

impl ExecutorCounters {
    /// Record the outcome of one unit of work.
    pub fn record(&self, succeeded: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fill the counter part of a stats snapshot.
    pub fn snapshot(&self, max_workers: usize) -> ExecutorStats {
        ExecutorStats {
            max_workers,
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            caller_runs: self.caller_runs.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            ..ExecutorStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_default_is_empty() {
        let stats = ExecutorStats::default();
        assert_eq!(stats.live_workers, 0);
        assert_eq!(stats.submitted, 0);
        assert_eq!(stats.completed, 0);
    }

    #[test]
    fn counters_snapshot() {
        let counters = ExecutorCounters::default();
        counters.submitted.fetch_add(3, Ordering::Relaxed);
        counters.record(true);
        counters.record(false);
        counters.caller_runs.fetch_add(1, Ordering::Relaxed);

        let stats = counters.snapshot(1);
        assert_eq!(stats.max_workers, 1);
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.caller_runs, 1);
    }
}
