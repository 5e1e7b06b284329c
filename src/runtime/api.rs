//! Operator-facing status models.

use serde::{Deserialize, Serialize};

use crate::core::{
    BackgroundExecutor, ExecutorStats, GameSequencer, NetworkLayer, SequencerState,
    SequencerStats, WorldLayer,
};

/// Snapshot of a server's scheduling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Server name.
    pub name: String,
    /// Sequencer state at capture time.
    pub state: SequencerState,
    /// Completed task-manager ticks.
    pub tick: u64,
    /// Live scheduled tasks.
    pub live_tasks: usize,
    /// Whether the parallel engine is enabled.
    pub parallel_engine: bool,
    /// Whether the background executor still accepts work.
    pub accepting_work: bool,
    /// Sequencer counters.
    pub sequencer: SequencerStats,
    /// Background executor utilisation.
    pub executor: ExecutorStats,
}

impl ServerStatus {
    /// Capture the status of a sequencer and its executor.
    pub fn capture<N, W>(
        name: &str,
        parallel_engine: bool,
        sequencer: &GameSequencer<N, W>,
        executor: &BackgroundExecutor,
    ) -> Self
    where
        N: NetworkLayer,
        W: WorldLayer,
    {
        Self {
            name: name.to_owned(),
            state: sequencer.state(),
            tick: sequencer.tasks().tick(),
            live_tasks: sequencer.tasks().len(),
            parallel_engine,
            accepting_work: !executor.is_shutdown(),
            sequencer: sequencer.stats(),
            executor: executor.stats(),
        }
    }
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Tick the health was computed at.
    pub tick: u64,
}

/// Derive a health payload from a status snapshot.
///
/// Healthy while the executor accepts work and fewer than half of the ticks
/// run so far were aborted. A server that has not ticked yet is healthy.
#[must_use]
pub fn health(status: &ServerStatus) -> Health {
    let stats = &status.sequencer;
    let aborted_ok =
        stats.ticks_aborted == 0 || stats.ticks_aborted.saturating_mul(2) < stats.ticks;
    Health {
        ok: status.accepting_work && aborted_ok,
        tick: status.tick,
    }
}
