//! The per-tick state machine.
//!
//! One tick runs three stages in a fixed order:
//!
//! 1. [`TaskManager::sequence`]
//! 2. [`NetworkLayer::sequence`]
//! 3. [`WorldLayer::sequence`]
//!
//! The first stage that fails (returns an error or panics) aborts the rest of
//! the tick. The failure is logged, every participant is saved through
//! [`WorldLayer::save_all`], and the sequencer goes back to idle so the next
//! tick runs normally.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, trace, warn};

use crate::core::error::panic_message;
use crate::core::{SequenceError, SequenceReport, TaskManager};

/// Network pump driven once per tick, after task processing.
pub trait NetworkLayer {
    /// Process pending I/O for this tick.
    ///
    /// # Errors
    ///
    /// Any error aborts the rest of the tick.
    fn sequence(&mut self) -> Result<(), SequenceError>;
}

/// World model driven once per tick, after the network pump.
pub trait WorldLayer {
    /// Advance entities and game logic by one tick.
    ///
    /// # Errors
    ///
    /// Any error aborts the rest of the tick.
    fn sequence(&mut self) -> Result<(), SequenceError>;

    /// Persist every participant. Called after a failed tick.
    ///
    /// Returns the number of participants saved.
    ///
    /// # Errors
    ///
    /// Failures are logged by the caller and never escalated.
    fn save_all(&mut self) -> Result<usize, SequenceError>;
}

/// Whether a tick is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Running the stages of a tick.
    Ticking,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Ticking => f.write_str("ticking"),
        }
    }
}

/// Stage of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Task processing.
    Tasks,
    /// Network pump.
    Network,
    /// World update.
    World,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tasks => f.write_str("tasks"),
            Self::Network => f.write_str("network"),
            Self::World => f.write_str("world"),
        }
    }
}

/// Result of [`GameSequencer::run_tick`].
#[derive(Debug)]
pub enum TickOutcome {
    /// Every stage ran.
    Completed(SequenceReport),
    /// A stage failed and the rest of the tick was skipped.
    Aborted {
        /// The stage that failed.
        stage: Stage,
        /// What went wrong.
        error: SequenceError,
        /// Participants saved by the emergency save, or `None` if the save
        /// itself failed.
        saved: Option<usize>,
    },
}

impl TickOutcome {
    /// Whether every stage ran.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Lifetime counters of a sequencer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerStats {
    /// Ticks started.
    pub ticks: u64,
    /// Ticks aborted by a failing stage.
    pub ticks_aborted: u64,
    /// Emergency saves attempted.
    pub emergency_saves: u64,
    /// Emergency saves that failed.
    pub failed_saves: u64,
    /// Wall time of the most recent tick, in microseconds.
    pub last_tick_micros: u64,
}

/// Drives the task manager, the network layer and the world layer in a fixed
/// order, once per call to [`GameSequencer::run_tick`].
pub struct GameSequencer<N, W> {
    tasks: TaskManager,
    network: N,
    world: W,
    state: SequencerState,
    stats: SequencerStats,
}

impl<N, W> GameSequencer<N, W>
where
    N: NetworkLayer,
    W: WorldLayer,
{
    /// Create an idle sequencer with an empty task manager.
    pub fn new(network: N, world: W) -> Self {
        Self::with_tasks(TaskManager::new(), network, world)
    }

    /// Create an idle sequencer around an existing task manager.
    pub fn with_tasks(tasks: TaskManager, network: N, world: W) -> Self {
        Self {
            tasks,
            network,
            world,
            state: SequencerState::Idle,
            stats: SequencerStats::default(),
        }
    }

    /// Run one tick.
    ///
    /// Never fails: a failing stage is reported in the returned outcome and
    /// the sequencer is idle again when this returns.
    pub fn run_tick(&mut self) -> TickOutcome {
        let started = Instant::now();
        self.state = SequencerState::Ticking;
        self.stats.ticks += 1;

        let outcome = match self.run_stages() {
            Ok(report) => {
                trace!(tick = report.tick, executed = report.executed, "Tick complete");
                TickOutcome::Completed(report)
            }
            Err((stage, err)) => {
                error!(
                    tick = self.tasks.tick(),
                    stage = %stage,
                    error = %err,
                    "Error during the game sequence, saving all participants"
                );
                self.stats.ticks_aborted += 1;
                let saved = self.emergency_save();
                TickOutcome::Aborted {
                    stage,
                    error: err,
                    saved,
                }
            }
        };

        self.state = SequencerState::Idle;
        self.stats.last_tick_micros =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        outcome
    }

    fn run_stages(&mut self) -> Result<SequenceReport, (Stage, SequenceError)> {
        let tasks = &mut self.tasks;
        let report = guard(|| Ok(tasks.sequence())).map_err(|e| (Stage::Tasks, e))?;

        let network = &mut self.network;
        guard(|| network.sequence()).map_err(|e| (Stage::Network, e))?;

        let world = &mut self.world;
        guard(|| world.sequence()).map_err(|e| (Stage::World, e))?;

        Ok(report)
    }

    fn emergency_save(&mut self) -> Option<usize> {
        self.stats.emergency_saves += 1;
        let world = &mut self.world;
        match guard(|| world.save_all()) {
            Ok(saved) => {
                info!(saved, "Emergency save complete");
                Some(saved)
            }
            Err(err) => {
                self.stats.failed_saves += 1;
                warn!(error = %err, "Emergency save failed");
                None
            }
        }
    }

    /// Current state. Always [`SequencerState::Idle`] between ticks.
    #[must_use]
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    /// Lifetime counters.
    #[must_use]
    pub const fn stats(&self) -> SequencerStats {
        self.stats
    }

    /// The task manager.
    #[must_use]
    pub const fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// The task manager, for submitting and cancelling between ticks.
    pub fn tasks_mut(&mut self) -> &mut TaskManager {
        &mut self.tasks
    }

    /// The network layer.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// The world layer.
    #[must_use]
    pub const fn world(&self) -> &W {
        &self.world
    }

    /// The world layer, mutably.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Split into the task manager and the two layers.
    pub fn into_parts(self) -> (TaskManager, N, W) {
        (self.tasks, self.network, self.world)
    }
}

impl<N, W> fmt::Debug for GameSequencer<N, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSequencer")
            .field("state", &self.state)
            .field("tasks", &self.tasks.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Run a stage, turning a panic into [`SequenceError::Panicked`].
fn guard<T>(stage: impl FnOnce() -> Result<T, SequenceError>) -> Result<T, SequenceError> {
    panic::catch_unwind(AssertUnwindSafe(stage))
        .unwrap_or_else(|payload| Err(SequenceError::Panicked(panic_message(payload.as_ref()))))
}
