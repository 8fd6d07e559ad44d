//! Poll loop with exponential backoff
//!
//! Calls [`Runner::process`] repeatedly. Work keeps the loop hot; idle polls
//! and store errors back off up to the configured ceiling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace};

use switchyard_core::{OutcomeStatus, Runner};

use crate::config::PollerConfig;

/// Idle backoff state
#[derive(Debug, Clone)]
pub struct Backoff {
    config: PollerConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            current: config.min_interval,
            config,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.config.min_interval;
    }

    pub fn increase(&mut self) {
        let next =
            Duration::from_secs_f64(self.current.as_secs_f64() * self.config.backoff_multiplier);
        self.current = next.min(self.config.max_interval);
    }
}

/// Counters reported when a loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub completed: u64,
    pub failed: u64,
    pub errors: u64,
}

pub struct PollLoop {
    runner: Arc<Runner>,
    backoff: Backoff,
    shutdown_rx: watch::Receiver<bool>,
}

impl PollLoop {
    pub fn new(runner: Arc<Runner>, config: PollerConfig, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            runner,
            backoff: Backoff::new(config),
            shutdown_rx,
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Sleep for the current interval; returns true if shutdown was signaled
    async fn wait(&mut self) -> bool {
        let interval = self.backoff.current();
        tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            changed = self.shutdown_rx.changed() => {
                // A dropped sender also means stop
                changed.is_err() || *self.shutdown_rx.borrow()
            }
        }
    }

    #[instrument(skip(self), fields(runner_id = %self.runner.config().runner_id))]
    pub async fn run(mut self) -> LoopStats {
        let mut stats = LoopStats::default();
        info!("Poll loop started");

        while !self.is_shutdown() {
            match self.runner.process(None).await {
                Ok(outcome) => match outcome.status {
                    OutcomeStatus::Idle => {
                        self.backoff.increase();
                        trace!(
                            interval_ms = self.backoff.current().as_millis() as u64,
                            "No claimable events, backing off"
                        );
                    }
                    OutcomeStatus::Completed | OutcomeStatus::Failed => {
                        if outcome.status == OutcomeStatus::Completed {
                            stats.completed += 1;
                        } else {
                            stats.failed += 1;
                        }
                        debug!(
                            event_id = ?outcome.event_id,
                            run_id = ?outcome.run_id,
                            status = ?outcome.status,
                            "Event processed"
                        );
                        self.backoff.reset();
                        continue;
                    }
                },
                Err(e) => {
                    stats.errors += 1;
                    error!(error = %e, "Runner invocation failed");
                    self.backoff.increase();
                }
            }

            if self.wait().await {
                break;
            }
        }

        info!(
            completed = stats.completed,
            failed = stats.failed,
            errors = stats.errors,
            "Poll loop stopped"
        );
        stats
    }
}
