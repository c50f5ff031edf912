//! Process-level wiring of one chaos run.
//!
//! The harness reseeds the datastore if asked, starts the workload loop,
//! waits out the warm-up, then runs the chaos sequencer until it finishes
//! or the shutdown future resolves. Results are returned in every case
//! where the workload loop got past setup.

use crate::error::{HarnessError, SequencerError, WorkloadError};
use crate::labels::label_channel;
use crate::orchestrator::Orchestrator;
use crate::report::Reporter;
use crate::repo::Repo;
use crate::results::Results;
use crate::sequencer::{ChaosSequencer, SequencerConfig};
use crate::workload::{WorkloadConfig, WorkloadLoop};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

/// Harness configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Drop and recreate the schema before the run.
    pub reseed: bool,
    /// Balance given to each seeded entity.
    pub initial_balance: f64,
    /// Delay between starting the workload and the first experiment.
    pub warmup: Duration,
    /// Workload settings. `entity_count` is also the seed size.
    pub workload: WorkloadConfig,
    /// Sequencer settings.
    pub sequencer: SequencerConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            reseed: false,
            initial_balance: 10_000.0,
            warmup: Duration::from_secs(5),
            workload: WorkloadConfig::default(),
            sequencer: SequencerConfig::default(),
        }
    }
}

/// How the chaos sequence ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every experiment ran.
    Completed,
    /// An experiment could not be run; the sequence stopped early.
    Failed(String),
    /// The shutdown signal arrived first.
    Interrupted,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            RunOutcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Results of a run and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Workload failure statistics.
    pub results: Results,
    /// How the chaos sequence ended.
    pub outcome: RunOutcome,
}

/// Runs the workload loop and the chaos sequencer side by side.
pub struct Harness {
    repo: Arc<dyn Repo>,
    orchestrator: Arc<dyn Orchestrator>,
    config: HarnessConfig,
    reporter: Arc<dyn Reporter>,
}

impl Harness {
    /// Create a harness.
    pub fn new(
        repo: Arc<dyn Repo>,
        orchestrator: Arc<dyn Orchestrator>,
        config: HarnessConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            repo,
            orchestrator,
            config,
            reporter,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run until the catalogue finishes, fails, or `shutdown` resolves.
    ///
    /// On shutdown the sequencer is aborted and any experiment it was
    /// holding is withdrawn before this returns.
    pub async fn run<F>(&self, shutdown: F) -> Result<RunSummary, HarnessError>
    where
        F: Future<Output = ()>,
    {
        if self.config.reseed {
            self.reseed().await?;
        }

        let (labels_tx, labels_rx) = label_channel();
        let workload =
            WorkloadLoop::new(self.config.workload.clone(), Arc::clone(&self.reporter));
        let repo = Arc::clone(&self.repo);
        let mut workload_task =
            tokio::spawn(async move { workload.run(repo, labels_rx).await });

        tokio::pin!(shutdown);

        tracing::info!("warming up for {:?}", self.config.warmup);
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                tracing::warn!("interrupted during warm-up");
                drop(labels_tx);
                let results = join_workload(workload_task).await?;
                return Ok(RunSummary { results, outcome: RunOutcome::Interrupted });
            }

            early = &mut workload_task => {
                // The loop only returns before its channel closes on a setup error.
                let results = flatten(early)?;
                return Ok(RunSummary { results, outcome: RunOutcome::Interrupted });
            }

            _ = tokio::time::sleep(self.config.warmup) => {}
        }

        let sequencer = Arc::new(ChaosSequencer::new(
            Arc::clone(&self.repo),
            Arc::clone(&self.orchestrator),
            self.config.sequencer.clone(),
            Arc::clone(&self.reporter),
        ));
        let pending = sequencer.pending_withdrawals();
        let mut sequencer_task = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            async move { sequencer.run(labels_tx).await }
        });

        let outcome = tokio::select! {
            finished = &mut sequencer_task => sequence_outcome(finished),

            _ = &mut shutdown => {
                tracing::warn!("interrupted, withdrawing active experiments");
                sequencer_task.abort();
                // Once the task is gone any held experiment has scheduled its withdrawal.
                // It may also have finished on its own before the abort landed.
                sequence_outcome(sequencer_task.await)
            }
        };

        pending.wait().await;

        let results = join_workload(workload_task).await?;
        Ok(RunSummary { results, outcome })
    }

    async fn reseed(&self) -> Result<(), HarnessError> {
        let count = self.config.workload.entity_count;
        tracing::info!("reseeding {} accounts", count);

        self.repo.deinit().await.map_err(HarnessError::Reseed)?;
        self.repo
            .init(count, self.config.initial_balance)
            .await
            .map_err(HarnessError::Reseed)
    }
}

/// Only a sequencer that was actually cut short counts as interrupted.
fn sequence_outcome(joined: Result<Result<(), SequencerError>, JoinError>) -> RunOutcome {
    match joined {
        Ok(Ok(())) => RunOutcome::Completed,
        Ok(Err(e)) => {
            tracing::error!("chaos sequence aborted: {}", e);
            RunOutcome::Failed(e.to_string())
        }
        Err(e) if e.is_cancelled() => RunOutcome::Interrupted,
        Err(e) => RunOutcome::Failed(format!("sequencer task failed: {e}")),
    }
}

type WorkloadTask = JoinHandle<Result<Results, WorkloadError>>;

async fn join_workload(task: WorkloadTask) -> Result<Results, HarnessError> {
    flatten(task.await)
}

fn flatten(
    joined: Result<Result<Results, WorkloadError>, JoinError>,
) -> Result<Results, HarnessError> {
    match joined {
        Ok(results) => Ok(results?),
        Err(e) => Err(HarnessError::Task(e.to_string())),
    }
}
