//! Completion handles for offloaded work.
//!
//! A handle and its completer share one slot guarded by a `parking_lot` mutex
//! and condvar. Waiting blocks on the condvar, no polling. A completer dropped
//! without completing marks the slot abandoned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::ExecutorError;

enum Slot<R> {
    Pending,
    Ready(Result<R, ExecutorError>),
    Taken,
}

struct Shared<R> {
    slot: Mutex<Slot<R>>,
    ready: Condvar,
}

impl<R> Shared<R> {
    fn store(&self, result: Result<R, ExecutorError>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Ready(result);
            self.ready.notify_all();
        }
    }
}

/// Eventual result of work submitted to a
/// [`BackgroundExecutor`](crate::core::BackgroundExecutor).
///
/// Dropping the handle does not cancel the work.
pub struct WorkHandle<R> {
    shared: Arc<Shared<R>>,
}

/// Write side of a [`WorkHandle`].
pub(crate) struct Completer<R> {
    shared: Option<Arc<Shared<R>>>,
}

/// Create a connected completer/handle pair.
pub(crate) fn pair<R>() -> (Completer<R>, WorkHandle<R>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    (
        Completer {
            shared: Some(Arc::clone(&shared)),
        },
        WorkHandle { shared },
    )
}

impl<R> Completer<R> {
    pub fn complete(mut self, result: Result<R, ExecutorError>) {
        if let Some(shared) = self.shared.take() {
            shared.store(result);
        }
    }
}

impl<R> Drop for Completer<R> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.store(Err(ExecutorError::Abandoned));
        }
    }
}

impl<R> WorkHandle<R> {
    /// Whether a result (or failure) is available.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Pending)
    }

    /// Take the result if it is available, without blocking.
    pub fn try_take(&self) -> Option<Result<R, ExecutorError>> {
        let mut slot = self.shared.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Pending => {
                *slot = Slot::Pending;
                None
            }
            Slot::Ready(result) => Some(result),
            Slot::Taken => Some(Err(ExecutorError::AlreadyTaken)),
        }
    }

    /// Block until the work finishes.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::Panicked`] if the work panicked
    /// - [`ExecutorError::Abandoned`] if the work was dropped without running
    pub fn wait(self) -> Result<R, ExecutorError> {
        let mut slot = self.shared.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.shared.ready.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => result,
            Slot::Pending | Slot::Taken => Err(ExecutorError::AlreadyTaken),
        }
    }

    /// Block until the work finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::Timeout`] if nothing arrived in time; the handle
    ///   stays usable
    /// - [`ExecutorError::Panicked`] if the work panicked
    /// - [`ExecutorError::Abandoned`] if the work was dropped without running
    /// - [`ExecutorError::AlreadyTaken`] if the result was already taken
    pub fn wait_timeout(&self, timeout: Duration) -> Result<R, ExecutorError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while matches!(*slot, Slot::Pending) {
            if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Pending => {
                *slot = Slot::Pending;
                Err(ExecutorError::Timeout)
            }
            Slot::Ready(result) => result,
            Slot::Taken => Err(ExecutorError::AlreadyTaken),
        }
    }
}

impl<R> std::fmt::Debug for WorkHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
