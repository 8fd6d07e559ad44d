// Worker configuration

use std::time::Duration;

use switchyard_core::RunnerConfig;

/// Poll interval bounds and backoff growth
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Interval after an idle poll that followed work
    pub min_interval: Duration,
    /// Ceiling for the idle backoff
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl PollerConfig {
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub runner: RunnerConfig,
    /// Number of concurrent poll loops
    pub concurrency: usize,
    pub poller: PollerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            concurrency: 1,
            poller: PollerConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create configuration from environment variables
    ///
    /// Runner settings come from [`RunnerConfig::from_env`], plus:
    /// - `WORKER_CONCURRENCY` (default: 1)
    /// - `POLL_MIN_INTERVAL_MS` (default: 200)
    /// - `POLL_MAX_INTERVAL_MS` (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut poller = defaults.poller;
        if let Some(ms) = env_u64("POLL_MIN_INTERVAL_MS") {
            poller.min_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("POLL_MAX_INTERVAL_MS") {
            poller.max_interval = Duration::from_millis(ms);
        }
        if poller.max_interval < poller.min_interval {
            poller.max_interval = poller.min_interval;
        }

        Self {
            runner: RunnerConfig::from_env(),
            concurrency: env_u64("WORKER_CONCURRENCY")
                .map(|n| n as usize)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.concurrency),
            poller,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    /// Runner identity for the loop at `index`
    ///
    /// A single loop keeps the configured id; several loops get a numeric suffix.
    pub fn runner_id_for(&self, index: usize) -> String {
        if self.concurrency <= 1 {
            self.runner.runner_id.clone()
        } else {
            format!("{}-{}", self.runner.runner_id, index)
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.poller.min_interval, Duration::from_millis(200));
        assert_eq!(config.poller.max_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_runner_ids() {
        let mut config = WorkerConfig::default();
        config.runner = config.runner.with_runner_id("w");
        assert_eq!(config.runner_id_for(0), "w");

        let config = config.with_concurrency(3);
        assert_eq!(config.runner_id_for(0), "w-0");
        assert_eq!(config.runner_id_for(2), "w-2");
    }

    #[test]
    fn test_backoff_multiplier_floor() {
        let poller = PollerConfig::default().with_backoff_multiplier(0.5);
        assert_eq!(poller.backoff_multiplier, 1.0);
    }
}
