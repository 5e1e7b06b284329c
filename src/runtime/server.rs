//! A built server: the sequencer, the background executor and the
//! configuration they were built from.

use tracing::info;

use crate::config::ServerConfig;
use crate::core::{
    BackgroundExecutor, GameSequencer, NetworkLayer, TaskManager, TaskSender, WorldLayer,
};
use crate::runtime::api::ServerStatus;

/// Running game server. Create one with
/// [`ServerBuilder`](crate::builders::ServerBuilder).
pub struct Server<N, W> {
    config: ServerConfig,
    sequencer: GameSequencer<N, W>,
    executor: BackgroundExecutor,
    parallel_engine: bool,
}

impl<N, W> Server<N, W>
where
    N: NetworkLayer,
    W: WorldLayer,
{
    pub(crate) const fn new(
        config: ServerConfig,
        sequencer: GameSequencer<N, W>,
        executor: BackgroundExecutor,
        parallel_engine: bool,
    ) -> Self {
        Self {
            config,
            sequencer,
            executor,
            parallel_engine,
        }
    }

    /// Drive ticks at the configured period until `shutdown` resolves, then
    /// cancel every task and stop the background executor.
    ///
    /// Returns the final status snapshot. Ticks run on the worker polling
    /// this future; see [`crate::runtime::run_ticks`].
    #[cfg(feature = "tokio-runtime")]
    pub async fn run<F>(&mut self, shutdown: F) -> ServerStatus
    where
        F: std::future::Future,
    {
        let period = self.config.tick_period();
        info!(
            server = %self.config.name,
            tick_period_ms = self.config.tick_period_ms,
            parallel_engine = self.parallel_engine,
            tasks = self.sequencer.tasks().len(),
            "Server online"
        );

        let ticks = crate::runtime::run_ticks(&mut self.sequencer, period, shutdown).await;

        let cancelled = self.sequencer.tasks_mut().cancel_all();
        let executor = self.executor.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || executor.shutdown()).await {
            tracing::warn!(error = %e, "Background executor shutdown did not complete");
        }

        info!(
            server = %self.config.name,
            ticks,
            cancelled,
            "Server stopped"
        );
        self.status()
    }

    /// Snapshot for operators.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        ServerStatus::capture(
            &self.config.name,
            self.parallel_engine,
            &self.sequencer,
            &self.executor,
        )
    }

    /// Handle for handing tasks back to the logic thread from background work.
    #[must_use]
    pub fn task_sender(&self) -> TaskSender {
        self.sequencer.tasks().sender()
    }

    /// The background executor.
    #[must_use]
    pub const fn executor(&self) -> &BackgroundExecutor {
        &self.executor
    }

    /// The sequencer.
    #[must_use]
    pub const fn sequencer(&self) -> &GameSequencer<N, W> {
        &self.sequencer
    }

    /// The sequencer, mutably. Use between ticks only.
    pub fn sequencer_mut(&mut self) -> &mut GameSequencer<N, W> {
        &mut self.sequencer
    }

    /// The task manager.
    #[must_use]
    pub const fn tasks(&self) -> &TaskManager {
        self.sequencer.tasks()
    }

    /// The configuration the server was built from.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether the parallel engine is enabled.
    ///
    /// Advisory for the network and world layers. Ticks run the same either
    /// way.
    #[must_use]
    pub const fn parallel_engine(&self) -> bool {
        self.parallel_engine
    }
}

impl<N, W> std::fmt::Debug for Server<N, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.config.name)
            .field("sequencer", &self.sequencer)
            .field("executor", &self.executor)
            .finish()
    }
}
