//! Assemble a [`Server`] from configuration, the two layers and the
//! long-lived tasks it starts with.

use anyhow::Context;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::{
    AppResult, BackgroundExecutor, GameSequencer, NetworkLayer, ScheduledTask, TaskManager,
    WorldLayer,
};
use crate::runtime::Server;

/// Builder for [`Server`].
pub struct ServerBuilder<N, W> {
    config: ServerConfig,
    network: N,
    world: W,
    tasks: Vec<ScheduledTask>,
    executor: Option<BackgroundExecutor>,
}

impl<N, W> ServerBuilder<N, W>
where
    N: NetworkLayer,
    W: WorldLayer,
{
    /// Start a builder.
    pub const fn new(config: ServerConfig, network: N, world: W) -> Self {
        Self {
            config,
            network,
            world,
            tasks: Vec::new(),
            executor: None,
        }
    }

    /// Add a task submitted when the server is built.
    #[must_use]
    pub fn with_task(mut self, task: ScheduledTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Add several tasks submitted when the server is built, in order.
    #[must_use]
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = ScheduledTask>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Use an existing executor instead of building one from the
    /// configuration.
    #[must_use]
    pub fn with_executor(mut self, executor: BackgroundExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Validate the configuration, start the executor and submit the seed
    /// tasks in the order they were added.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the executor cannot be
    /// created.
    pub fn build(self) -> AppResult<Server<N, W>> {
        let Self {
            config,
            network,
            world,
            tasks,
            executor,
        } = self;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("server config invalid: {e}"))?;

        let executor = match executor {
            Some(executor) => executor,
            None => BackgroundExecutor::new(config.executor.clone())
                .context("failed to start background executor")?,
        };
        let parallel_engine = config.resolve_parallel_engine();

        let mut manager = TaskManager::new();
        let seeded = tasks.len();
        for task in tasks {
            manager.submit(task);
        }

        info!(
            server = %config.name,
            seeded,
            parallel_engine,
            "Server built"
        );

        let sequencer = GameSequencer::with_tasks(manager, network, world);
        Ok(Server::new(config, sequencer, executor, parallel_engine))
    }
}

impl<N, W> std::fmt::Debug for ServerBuilder<N, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
