//! Scheduling core: tasks, the task manager, the background executor and the
//! tick sequencer.

pub mod error;
pub mod key;
pub mod sequencer;
pub mod task;
pub mod task_manager;
pub mod worker_pool;

pub use error::{AppResult, ExecutorError, SchedulerError, SequenceError, TaskError};
pub use key::TaskKey;
pub use sequencer::{
    GameSequencer, NetworkLayer, SequencerState, SequencerStats, Stage, TickOutcome, WorldLayer,
};
pub use task::{ScheduledTask, Task, TaskContext, TaskId};
pub use task_manager::{SequenceReport, TaskManager, TaskSender};
pub use worker_pool::{BackgroundExecutor, ExecutorStats, WorkHandle};
