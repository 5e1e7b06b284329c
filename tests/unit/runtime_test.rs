//! Tests for runtime status models

use game_sequencer::config::ExecutorConfig;
use game_sequencer::core::{
    BackgroundExecutor, GameSequencer, NetworkLayer, ScheduledTask, SequenceError, WorldLayer,
};
use game_sequencer::runtime::{health, ServerStatus};

struct Idle;

impl NetworkLayer for Idle {
    fn sequence(&mut self) -> Result<(), SequenceError> {
        Ok(())
    }
}

impl WorldLayer for Idle {
    fn sequence(&mut self) -> Result<(), SequenceError> {
        Ok(())
    }

    fn save_all(&mut self) -> Result<usize, SequenceError> {
        Ok(0)
    }
}

#[test]
fn test_capture_reflects_sequencer_and_executor() {
    let mut sequencer = GameSequencer::new(Idle, Idle);
    sequencer
        .tasks_mut()
        .submit(ScheduledTask::from_fn(10, false, |_| Ok(())).unwrap());
    sequencer.run_tick();
    sequencer.run_tick();
    let executor = BackgroundExecutor::new(ExecutorConfig::default()).unwrap();

    let status = ServerStatus::capture("world-1", true, &sequencer, &executor);
    assert_eq!(status.name, "world-1");
    assert_eq!(status.tick, 2);
    assert_eq!(status.live_tasks, 1);
    assert_eq!(status.sequencer.ticks, 2);
    assert_eq!(status.executor.max_workers, 1);
    assert!(status.parallel_engine);
    assert!(health(&status).ok);

    executor.shutdown();
    let status = ServerStatus::capture("world-1", true, &sequencer, &executor);
    assert!(!status.accepting_work);
    assert!(!health(&status).ok);
}

#[test]
fn test_status_json_shape() {
    let sequencer = GameSequencer::new(Idle, Idle);
    let executor = BackgroundExecutor::new(ExecutorConfig::default()).unwrap();
    let status = ServerStatus::capture("world-1", false, &sequencer, &executor);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "idle");
    assert_eq!(json["executor"]["caller_runs"], 0);
    assert_eq!(json["sequencer"]["ticks_aborted"], 0);
    executor.shutdown();
}
