//! # chaos-core
//!
//! Coordination logic for db-chaos.
//!
//! Two independently paced activities run side by side for the length of a
//! test:
//!
//! ```text
//!  ChaosSequencer ──label──► [ slot (1) ] ──► WorkloadLoop ──► ResultAggregator
//!       │                                         │
//!       ├── ReadinessGate ──► Repo ◄──────────────┘
//!       └── Orchestrator (submit / hold / withdraw)
//! ```
//!
//! - [`WorkloadLoop`] performs one transfer per tick and attributes failures
//!   to the most recently received label.
//! - [`ChaosSequencer`] walks the fixed experiment catalogue, gated on the
//!   datastore reporting itself ready between experiments.
//! - [`Harness`] starts both and produces the final [`RunSummary`].
//!
//! The datastore and the orchestration platform sit behind the [`Repo`] and
//! [`Orchestrator`] traits. [`MockRepo`] and [`MockOrchestrator`] implement
//! them in memory for tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod harness;
pub mod labels;
pub mod orchestrator;
pub mod readiness;
pub mod report;
pub mod repo;
pub mod results;
pub mod sequencer;
pub mod workload;

pub use error::{HarnessError, ReadinessError, SequencerError, WorkloadError};
pub use harness::{Harness, HarnessConfig, RunOutcome, RunSummary};
pub use labels::{label_channel, LabelChannelClosed, LabelReceiver, LabelSender};
pub use orchestrator::{
    ExperimentHandle, HeldExperiment, MockOrchestrator, Orchestrator, OrchestratorError,
    PendingWithdrawals,
};
pub use readiness::{ReadinessConfig, ReadinessGate};
pub use report::{
    ExperimentEvent, NullReporter, Progress, RecordingReporter, Reporter, TracingReporter,
};
pub use repo::{EntityId, MockRepo, Repo, RepoError, TransferReport};
pub use results::{ExperimentStats, ResultAggregator, Results};
pub use sequencer::{ordered_pairs, ChaosSequencer, SequencerConfig};
pub use workload::{Outcome, WorkloadConfig, WorkloadLoop};
