//! The workload loop: one balance transfer per tick.
//!
//! The loop waits on exactly two things, multiplexed with `select!`: the
//! next tick and the next label. Labels are checked first so an experiment
//! boundary is applied before the transfer that follows it. Closing the
//! label channel is the only way the loop ends.

use crate::error::WorkloadError;
use crate::labels::LabelReceiver;
use crate::report::{Progress, Reporter};
use crate::repo::{EntityId, Repo, RepoError, TransferReport};
use crate::results::{ResultAggregator, Results};
use chaos_types::QUIESCENT;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Workload configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Ids fetched once at startup.
    pub entity_count: usize,
    /// Time between transfers.
    pub cadence: Duration,
    /// Transfer amounts are drawn from `[0, max_amount)`.
    pub max_amount: f64,
    /// Seed for entity sampling and amounts (random when unset).
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            entity_count: 10_000,
            cadence: Duration::from_millis(100),
            max_amount: 100.0,
            seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.cadence.is_zero() {
            return Err(WorkloadError::ZeroCadence);
        }
        Ok(())
    }
}

/// How one transfer counts toward the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Committed.
    Success,
    /// Failed; counted.
    Failure,
    /// Cancelled by the harness; not counted.
    Cancelled,
}

impl Outcome {
    /// Classify a transfer result.
    pub fn classify(result: &Result<(), RepoError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(e) if e.is_cancellation() => Outcome::Cancelled,
            Err(_) => Outcome::Failure,
        }
    }
}

/// Drives transfers and attributes failures to experiment labels.
pub struct WorkloadLoop {
    config: WorkloadConfig,
    reporter: Arc<dyn Reporter>,
}

impl WorkloadLoop {
    /// Create a workload loop.
    pub fn new(config: WorkloadConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self { config, reporter }
    }

    /// Get the configuration.
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Run until the label channel closes, then return the results.
    ///
    /// Only setup can fail; transfer failures are counted, never returned.
    pub async fn run(
        &self,
        repo: Arc<dyn Repo>,
        mut labels: LabelReceiver,
    ) -> Result<Results, WorkloadError> {
        self.config.validate()?;

        let ids = repo
            .fetch_ids(self.config.entity_count)
            .await
            .map_err(WorkloadError::Setup)?;
        if ids.len() < 2 {
            return Err(WorkloadError::NotEnoughEntities { found: ids.len() });
        }
        tracing::info!("fetched {} ids ahead of test", ids.len());

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut aggregator = ResultAggregator::new();
        let mut current = QUIESCENT.to_string();

        let mut transfers = interval(self.config.cadence);
        transfers.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                label = labels.recv() => match label {
                    Some(label) => {
                        tracing::debug!("experiment label now {:?}", label);
                        current = label;
                    }
                    None => {
                        tracing::info!("label channel closed, stopping workload");
                        return Ok(aggregator.snapshot());
                    }
                },

                _ = transfers.tick() => {
                    let (from, to, amount) = self.sample(&ids, &mut rng);
                    let report = repo.perform_transfer(from, to, amount).await;
                    self.record(&mut aggregator, &current, &report);
                }
            }
        }
    }

    fn sample<'a>(
        &self,
        ids: &'a [EntityId],
        rng: &mut StdRng,
    ) -> (&'a EntityId, &'a EntityId, f64) {
        // `ids` holds at least two entries, checked at startup.
        let pair = index::sample(rng, ids.len(), 2);
        let (from, to) = (&ids[pair.index(0)], &ids[pair.index(1)]);
        let amount = rng.gen::<f64>() * self.config.max_amount;
        (from, to, amount)
    }

    fn record(&self, aggregator: &mut ResultAggregator, label: &str, report: &TransferReport) {
        if Outcome::classify(&report.outcome) == Outcome::Failure {
            if let Err(e) = &report.outcome {
                self.reporter.transfer_failed(label, e);
            }
            aggregator.record_failure(label, report.elapsed);
        }

        self.reporter.tick(&Progress {
            latency: report.elapsed,
            errors: aggregator.total_errors(),
            downtime: aggregator.total_downtime(),
        });
    }
}
