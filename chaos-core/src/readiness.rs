//! Readiness gate between experiments.
//!
//! Progression to the next experiment is coupled to the datastore's own
//! health signal rather than a fixed sleep, so experiments never overlap
//! with the fallout of the previous one.

use crate::error::ReadinessError;
use crate::report::{ExperimentEvent, Reporter};
use crate::repo::Repo;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, timeout_at, Instant, MissedTickBehavior};

/// Readiness polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Time between health checks. The first check happens one interval in.
    pub poll_interval: Duration,
    /// Overall deadline for one wait.
    pub timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ReadinessConfig {
    /// Reject settings the gate cannot poll with.
    pub fn validate(&self) -> Result<(), ReadinessError> {
        if self.poll_interval.is_zero() {
            return Err(ReadinessError::ZeroPollInterval);
        }
        Ok(())
    }
}

/// Polls [`Repo::is_ready`] until it says yes or the deadline passes.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessGate {
    config: ReadinessConfig,
}

impl ReadinessGate {
    /// Create a gate.
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Wait until the datastore reports ready.
    ///
    /// Poll errors and "not ready" answers are retried. A poll still in
    /// flight when the deadline passes is abandoned, and no further polls
    /// are made.
    pub async fn wait_for_ready(
        &self,
        repo: &dyn Repo,
        reporter: &dyn Reporter,
    ) -> Result<(), ReadinessError> {
        self.config.validate()?;

        let start = Instant::now();
        let deadline = start + self.config.timeout;

        let mut checks = interval_at(start + self.config.poll_interval, self.config.poll_interval);
        checks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = sleep_until(deadline) => {
                    return Err(ReadinessError::Timeout(self.config.timeout));
                }

                _ = checks.tick() => {
                    let answer = match timeout_at(deadline, repo.is_ready()).await {
                        Ok(answer) => answer,
                        Err(_) => return Err(ReadinessError::Timeout(self.config.timeout)),
                    };

                    match answer {
                        Ok(true) => {
                            reporter.experiment(&ExperimentEvent::Ready);
                            return Ok(());
                        }
                        Ok(false) => reporter.experiment(&ExperimentEvent::WaitingForReady),
                        Err(e) => reporter
                            .experiment(&ExperimentEvent::ReadinessCheckFailed(e.to_string())),
                    }
                }
            }
        }
    }
}
