//! Error types for db-chaos coordination.
//!
//! Workload-level failures never appear here: a failed transfer is a
//! statistic, not an error. These types cover setup failures and the
//! failures that abort the chaos sequence.

use crate::labels::LabelChannelClosed;
use crate::orchestrator::OrchestratorError;
use crate::repo::RepoError;
use chaos_types::DescriptorError;
use std::time::Duration;
use thiserror::Error;

/// The datastore never reported ready in time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    /// Deadline elapsed without a ready answer.
    #[error("datastore not ready after {0:?}")]
    Timeout(Duration),

    /// The poll interval was zero.
    #[error("readiness poll interval must be non-zero")]
    ZeroPollInterval,
}

/// Workload loop setup errors.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// Could not fetch entity ids ahead of the run.
    #[error("fetching ids ahead of test: {0}")]
    Setup(#[source] RepoError),

    /// A transfer needs two distinct entities.
    #[error("need at least 2 entities, found {found}")]
    NotEnoughEntities {
        /// Ids returned by the repo.
        found: usize,
    },

    /// The transfer cadence was zero.
    #[error("workload cadence must be non-zero")]
    ZeroCadence,
}

/// Errors that abort the chaos sequence.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// Could not discover target instances.
    #[error("fetching instances: {0}")]
    Discovery(#[source] OrchestratorError),

    /// Target namespace has no instances to experiment on.
    #[error("no instances found in namespace {0}")]
    NoInstances(String),

    /// Submitting or withdrawing an experiment failed.
    #[error("running {label}: {source}")]
    Orchestration {
        /// Experiment class being run.
        label: &'static str,
        /// Underlying failure.
        #[source]
        source: OrchestratorError,
    },

    /// Datastore did not recover between experiments.
    #[error("running {label}: waiting for ready: {source}")]
    Readiness {
        /// Experiment class being run.
        label: &'static str,
        /// Underlying failure.
        #[source]
        source: ReadinessError,
    },

    /// A descriptor could not be built.
    #[error("running {label}: {source}")]
    Descriptor {
        /// Experiment class being run.
        label: &'static str,
        /// Underlying failure.
        #[source]
        source: DescriptorError,
    },

    /// The workload loop is gone.
    #[error(transparent)]
    LabelChannel(#[from] LabelChannelClosed),
}

/// Errors that prevent a run from producing results.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Dropping or recreating the schema failed.
    #[error("reseeding: {0}")]
    Reseed(#[source] RepoError),

    /// The workload loop could not start.
    #[error(transparent)]
    Workload(#[from] WorkloadError),

    /// A run task panicked.
    #[error("task failed: {0}")]
    Task(String),
}
