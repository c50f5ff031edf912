//! Orchestration platform capability.
//!
//! The sequencer discovers target instances and submits/withdraws failure
//! experiments through [`Orchestrator`]. Experiments are fire-and-forget
//! resources with a fixed lifecycle: create, hold, delete. There is no
//! desired-state tracking.
//!
//! A submitted experiment is owned by a [`HeldExperiment`]. Withdrawing it is
//! normally explicit (`withdraw().await`), but if the guard is dropped while
//! still held (the owning task was aborted or panicked) it schedules the
//! withdrawal on the current runtime and records the task in
//! [`PendingWithdrawals`] so the caller can wait for the cluster to be clean.

mod mock;

pub use mock::MockOrchestrator;

use async_trait::async_trait;
use chaos_types::ExperimentDescriptor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Attempts made to delete an experiment before giving up.
pub const WITHDRAW_ATTEMPTS: u32 = 3;

/// Pause between withdrawal attempts.
const WITHDRAW_BACKOFF: Duration = Duration::from_secs(1);

/// Orchestration errors.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// Listing service instances failed.
    #[error("discovery failed in namespace {namespace}: {reason}")]
    Discovery {
        /// Namespace that was listed.
        namespace: String,
        /// Underlying failure.
        reason: String,
    },

    /// An experiment with this name already exists.
    #[error("experiment already exists: {0}")]
    AlreadyExists(String),

    /// Creating the experiment resource failed.
    #[error("submit {name} failed: {reason}")]
    Submit {
        /// Experiment name.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// Deleting the experiment resource failed.
    #[error("withdraw {name} failed: {reason}")]
    Withdraw {
        /// Experiment name.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// The platform could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Reference to a submitted experiment, enough to delete it again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentHandle {
    /// Resource name.
    pub name: String,
    /// Namespace the resource lives in.
    pub namespace: String,
    /// Plural resource name (`podchaos`, `networkchaos`, `iochaos`).
    pub resource_plural: String,
}

impl ExperimentHandle {
    /// Handle for the resource a descriptor creates.
    pub fn for_descriptor(descriptor: &ExperimentDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            namespace: descriptor.namespace().to_string(),
            resource_plural: descriptor.experiment.resource_plural().to_string(),
        }
    }
}

/// Orchestration platform capability consumed by the chaos sequencer.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Names of the running service instances in `namespace`.
    async fn list_service_instances(&self, namespace: &str)
        -> Result<Vec<String>, OrchestratorError>;

    /// Create the experiment resource.
    async fn submit(
        &self,
        descriptor: &ExperimentDescriptor,
    ) -> Result<ExperimentHandle, OrchestratorError>;

    /// Delete the experiment resource.
    async fn withdraw(&self, handle: &ExperimentHandle) -> Result<(), OrchestratorError>;
}

/// Withdrawals scheduled by dropped [`HeldExperiment`] guards.
#[derive(Debug, Clone, Default)]
pub struct PendingWithdrawals {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PendingWithdrawals {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, task: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }

    /// Number of withdrawals not yet awaited.
    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every scheduled withdrawal to finish.
    pub async fn wait(&self) {
        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => return,
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("withdrawal task failed: {}", e);
            }
        }
    }
}

/// A submitted experiment that must be withdrawn.
pub struct HeldExperiment {
    orchestrator: Arc<dyn Orchestrator>,
    handle: ExperimentHandle,
    pending: PendingWithdrawals,
    withdrawn: bool,
}

impl HeldExperiment {
    /// Submit `descriptor` and take ownership of the resulting experiment.
    pub async fn submit(
        orchestrator: Arc<dyn Orchestrator>,
        descriptor: &ExperimentDescriptor,
        pending: PendingWithdrawals,
    ) -> Result<Self, OrchestratorError> {
        let handle = orchestrator.submit(descriptor).await?;
        Ok(Self {
            orchestrator,
            handle,
            pending,
            withdrawn: false,
        })
    }

    /// Handle of the held experiment.
    pub fn handle(&self) -> &ExperimentHandle {
        &self.handle
    }

    /// Withdraw the experiment, retrying up to [`WITHDRAW_ATTEMPTS`] times.
    pub async fn withdraw(mut self) -> Result<(), OrchestratorError> {
        // Retries live inside; the guard must not try again on drop.
        self.withdrawn = true;
        withdraw_with_retry(self.orchestrator.as_ref(), &self.handle).await
    }
}

impl Drop for HeldExperiment {
    fn drop(&mut self) {
        if self.withdrawn {
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = self.handle.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!("experiment {} dropped while held, withdrawing", handle.name);
                let task = runtime.spawn(async move {
                    if let Err(e) = withdraw_with_retry(orchestrator.as_ref(), &handle).await {
                        tracing::error!("experiment {} left in place: {}", handle.name, e);
                    }
                });
                self.pending.push(task);
            }
            Err(_) => {
                tracing::error!(
                    "experiment {}/{} left in place: no runtime to withdraw it",
                    handle.namespace,
                    handle.name
                );
            }
        }
    }
}

async fn withdraw_with_retry(
    orchestrator: &dyn Orchestrator,
    handle: &ExperimentHandle,
) -> Result<(), OrchestratorError> {
    let mut attempt = 1;
    loop {
        match orchestrator.withdraw(handle).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= WITHDRAW_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "withdraw {} attempt {}/{} failed: {}",
                    handle.name,
                    attempt,
                    WITHDRAW_ATTEMPTS,
                    e
                );
                attempt += 1;
                tokio::time::sleep(WITHDRAW_BACKOFF).await;
            }
        }
    }
}
