//! Integration tests for the BackgroundExecutor
//!
//! These tests validate real-world functionality including:
//! - Work running on named worker threads
//! - Caller-runs fallback when the pool is saturated
//! - Bounded queueing in front of busy workers
//! - Delayed scheduling and ordering
//! - Panic isolation
//! - Graceful shutdown

use game_sequencer::config::ExecutorConfig;
use game_sequencer::core::{BackgroundExecutor, ExecutorError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

fn executor(max_workers: usize, queue_capacity: usize) -> BackgroundExecutor {
    BackgroundExecutor::new(
        ExecutorConfig::new()
            .with_max_workers(max_workers)
            .with_queue_capacity(queue_capacity)
            .with_keep_alive(Duration::from_secs(1))
            .with_thread_name("test-worker"),
    )
    .unwrap()
}

/// Occupy one worker until the returned sender is used or dropped.
fn occupy_worker(pool: &BackgroundExecutor) -> (mpsc::Sender<()>, game_sequencer::core::WorkHandle<()>) {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let handle = pool
        .submit(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
    started_rx.recv_timeout(WAIT).expect("worker never started");
    (release_tx, handle)
}

// ============================================================================
// BASIC EXECUTION
// ============================================================================

#[test]
fn test_work_runs_on_named_worker() {
    let pool = executor(1, 0);
    let handle = pool
        .submit(|| thread::current().name().map(ToOwned::to_owned))
        .unwrap();
    let name = handle.wait_timeout(WAIT).unwrap().unwrap();
    assert!(name.starts_with("test-worker-"), "unexpected name {name}");
    pool.shutdown();
}

#[test]
fn test_workers_scale_up_to_max() {
    let pool = executor(3, 0);
    let barrier = Arc::new(Barrier::new(3));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            pool.submit(move || {
                barrier.wait();
                thread::current().id()
            })
            .unwrap()
        })
        .collect();

    let ids: HashSet<_> = handles
        .iter()
        .map(|h| h.wait_timeout(WAIT).unwrap())
        .collect();
    assert_eq!(ids.len(), 3, "each job ran on its own worker");
    assert_eq!(pool.stats().caller_runs, 0);
    pool.shutdown();
}

// ============================================================================
// OVERLOAD POLICY
// ============================================================================

#[test]
fn test_busy_worker_runs_work_on_caller() {
    let pool = executor(1, 0);
    let (release, blocker) = occupy_worker(&pool);

    let caller = thread::current().id();
    let handle = pool.submit(move || thread::current().id()).unwrap();
    assert!(handle.is_finished(), "caller-run work completes before submit returns");
    assert_eq!(handle.wait().unwrap(), caller);
    assert_eq!(pool.stats().caller_runs, 1);

    release.send(()).unwrap();
    blocker.wait_timeout(WAIT).unwrap();
    pool.shutdown();
}

#[test]
fn test_queue_capacity_defers_caller_runs() {
    let pool = executor(1, 2);
    let (release, blocker) = occupy_worker(&pool);

    let queued: Vec<_> = (0..2).map(|i| pool.submit(move || i).unwrap()).collect();
    assert_eq!(pool.stats().queued, 2);
    assert!(queued.iter().all(|h| !h.is_finished()));

    let overflow = pool.submit(|| 99).unwrap();
    assert!(overflow.is_finished());
    assert_eq!(pool.stats().caller_runs, 1);

    release.send(()).unwrap();
    blocker.wait_timeout(WAIT).unwrap();
    for (i, handle) in queued.into_iter().enumerate() {
        assert_eq!(handle.wait_timeout(WAIT).unwrap(), i);
    }
    pool.shutdown();
}

#[test]
fn test_submission_and_completion_counts_match() {
    let pool = executor(1, 0);
    let done = Arc::new(AtomicU64::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                (0..25)
                    .map(|_| {
                        let done = Arc::clone(&done);
                        pool.submit(move || {
                            thread::sleep(Duration::from_millis(1));
                            done.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for submitter in submitters {
        for handle in submitter.join().unwrap() {
            handle.wait_timeout(WAIT).unwrap();
        }
    }

    let stats = pool.stats();
    assert_eq!(done.load(Ordering::SeqCst), 100, "no work was lost");
    assert_eq!(stats.submitted, 100);
    assert_eq!(stats.completed, 100);
    pool.shutdown();
}

// ============================================================================
// SCHEDULING
// ============================================================================

#[test]
fn test_scheduled_work_runs_in_due_order() {
    let pool = executor(1, 0);
    let order = Arc::new(Mutex::new(Vec::new()));

    let late = {
        let order = Arc::clone(&order);
        pool.schedule(move || order.lock().unwrap().push("late"), Duration::from_millis(120))
            .unwrap()
    };
    let early = {
        let order = Arc::clone(&order);
        pool.schedule(move || order.lock().unwrap().push("early"), Duration::from_millis(30))
            .unwrap()
    };
    assert_eq!(pool.stats().scheduled, 2);

    early.wait_timeout(WAIT).unwrap();
    late.wait_timeout(WAIT).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
    pool.shutdown();
}

#[test]
fn test_zero_delay_schedule_is_immediate() {
    let pool = executor(1, 0);
    let start = Instant::now();
    let handle = pool.schedule(|| 5, Duration::ZERO).unwrap();
    assert_eq!(handle.wait_timeout(WAIT), Ok(5));
    assert!(start.elapsed() < WAIT);
    assert_eq!(pool.stats().scheduled, 0);
    pool.shutdown();
}

// ============================================================================
// FAILURES AND SHUTDOWN
// ============================================================================

#[test]
fn test_panic_is_reported_and_worker_survives() {
    let pool = executor(1, 0);
    let bad = pool.submit(|| -> u32 { panic!("lookup failed") }).unwrap();
    assert!(matches!(
        bad.wait_timeout(WAIT),
        Err(ExecutorError::Panicked(msg)) if msg == "lookup failed"
    ));

    let good = pool.submit(|| 1_u32).unwrap();
    assert_eq!(good.wait_timeout(WAIT), Ok(1));

    let stats = pool.stats();
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.completed, 2);
    pool.shutdown();
}

#[test]
fn test_shutdown_finishes_queued_work() {
    let pool = executor(1, 1);
    let (release, blocker) = occupy_worker(&pool);
    let queued = pool.submit(|| "drained").unwrap();

    release.send(()).unwrap();
    pool.shutdown();

    assert_eq!(blocker.wait_timeout(WAIT), Ok(()));
    assert_eq!(queued.wait_timeout(WAIT), Ok("drained"));
}

#[test]
fn test_shutdown_abandons_delayed_work() {
    let pool = executor(1, 0);
    let handle = pool.schedule(|| (), Duration::from_secs(30)).unwrap();

    pool.shutdown();
    pool.shutdown();

    assert_eq!(handle.wait(), Err(ExecutorError::Abandoned));
    assert_eq!(pool.stats().abandoned, 1);
    assert!(matches!(pool.submit(|| ()), Err(ExecutorError::ShutDown)));
    assert!(matches!(
        pool.schedule(|| (), Duration::from_secs(1)),
        Err(ExecutorError::ShutDown)
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let result = BackgroundExecutor::new(ExecutorConfig::new().with_max_workers(0));
    assert!(result.is_err());
}
