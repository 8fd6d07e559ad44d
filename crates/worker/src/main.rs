// Switchyard worker binary
//
// Polls the event queue and runs the agent runner until Ctrl-C.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use switchyard_storage::Database;
use switchyard_worker::{RunnerDeps, Worker, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchyard_worker=info,switchyard_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("switchyard-worker starting...");

    let db = Database::from_env()
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    tracing::info!("Connected to database");

    let config = WorkerConfig::from_env();
    tracing::info!(
        runner_id = %config.runner.runner_id,
        concurrency = config.concurrency,
        lease_timeout_secs = config.runner.lease_timeout.as_secs(),
        "Worker configured"
    );

    let deps = RunnerDeps::from_env(&db)?;
    let worker = Worker::new(config, deps);
    let shutdown = worker.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown.send(true);
        }
    });

    worker.run().await?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
