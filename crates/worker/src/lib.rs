// Switchyard Worker
//
// External scheduler for the runner: N poll loops, each invoking
// Runner::process sequentially. Loops coordinate only through the event
// store's atomic claim, so workers can also run as separate processes.

pub mod config;
pub mod poller;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use switchyard_core::{ModelClient, Runner, RunnerConfig, RunnerStores, ToolRegistry, ToolStores};
use switchyard_openai::OpenAiModelClient;
use switchyard_storage::Database;

pub use config::{PollerConfig, WorkerConfig};
pub use poller::{Backoff, LoopStats, PollLoop};

/// Everything a runner needs besides its configuration
#[derive(Clone)]
pub struct RunnerDeps {
    pub stores: RunnerStores,
    pub tool_stores: ToolStores,
    pub model: Arc<dyn ModelClient>,
}

impl RunnerDeps {
    pub fn new(stores: RunnerStores, tool_stores: ToolStores, model: Arc<dyn ModelClient>) -> Self {
        Self {
            stores,
            tool_stores,
            model,
        }
    }

    /// Postgres stores and the given model client
    pub fn from_database(db: &Database, model: Arc<dyn ModelClient>) -> Self {
        Self::new(db.runner_stores(), db.tool_stores(), model)
    }

    /// Postgres stores and the OpenAI client configured from the environment
    pub fn from_env(db: &Database) -> Result<Self> {
        let model = OpenAiModelClient::from_env().context("Failed to configure model client")?;
        Ok(Self::from_database(db, Arc::new(model)))
    }
}

/// Build a runner with the built-in tools registered
pub fn create_runner(config: RunnerConfig, deps: &RunnerDeps) -> Runner {
    Runner::new(
        config,
        deps.stores.clone(),
        deps.model.clone(),
        ToolRegistry::with_builtins(&deps.tool_stores),
    )
}

pub struct Worker {
    config: WorkerConfig,
    deps: RunnerDeps,
    shutdown_tx: watch::Sender<bool>,
}

impl Worker {
    pub fn new(config: WorkerConfig, deps: RunnerDeps) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            deps,
            shutdown_tx,
        }
    }

    /// Handle that stops every loop after its current event
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn build_runner(&self, index: usize) -> Runner {
        let runner_config = self
            .config
            .runner
            .clone()
            .with_runner_id(self.config.runner_id_for(index));
        create_runner(runner_config, &self.deps)
    }

    /// Run all loops until shutdown; returns the summed stats
    pub async fn run(&self) -> Result<LoopStats> {
        info!(
            concurrency = self.config.concurrency,
            runner_id = %self.config.runner.runner_id,
            "Starting worker"
        );

        let mut loops = JoinSet::new();
        for index in 0..self.config.concurrency {
            let poll_loop = PollLoop::new(
                Arc::new(self.build_runner(index)),
                self.config.poller.clone(),
                self.shutdown_tx.subscribe(),
            );
            loops.spawn(poll_loop.run());
        }

        let mut total = LoopStats::default();
        while let Some(result) = loops.join_next().await {
            match result {
                Ok(stats) => {
                    total.completed += stats.completed;
                    total.failed += stats.failed;
                    total.errors += stats.errors;
                }
                Err(e) => error!(error = %e, "Poll loop panicked"),
            }
        }

        info!(
            completed = total.completed,
            failed = total.failed,
            errors = total.errors,
            "Worker stopped"
        );
        Ok(total)
    }
}
