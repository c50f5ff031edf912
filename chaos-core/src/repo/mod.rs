//! Datastore capability.
//!
//! The workload loop and the readiness gate only ever talk to the datastore
//! through [`Repo`]. Each backing store is a separate implementation chosen
//! at startup; none of them share behaviour through inheritance.
//!
//! # Contract
//!
//! - `deinit()` must succeed on a fresh, empty store.
//! - `perform_transfer()` enforces its own deadline, retries transient
//!   serialization conflicts before giving up, and always reports elapsed
//!   wall-clock time, even when it fails.
//! - Implementations are shared between tasks and must be safe for
//!   concurrent use.

mod mock;

pub use mock::MockRepo;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Opaque entity (account) identifier, owned by the repo.
pub type EntityId = String;

/// Datastore errors.
#[derive(Debug, Clone, Error)]
pub enum RepoError {
    /// The database rejected or failed the statement.
    #[error("database error: {0}")]
    Database(String),

    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Serialization conflicts persisted through every retry.
    #[error("transaction conflict after {attempts} attempts: {reason}")]
    Conflict {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last conflict reported by the database.
        reason: String,
    },

    /// The harness gave up waiting on the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed input or response.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl RepoError {
    /// True when the error is a cancellation rather than a datastore failure.
    ///
    /// Cancellations are a side effect of the harness itself and are never
    /// counted as workload failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RepoError::Cancelled)
    }
}

/// Timing and outcome of one transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Wall-clock time spent, recorded on success and failure alike.
    pub elapsed: Duration,
    /// Whether the transfer committed.
    pub outcome: Result<(), RepoError>,
}

impl TransferReport {
    /// A committed transfer.
    pub fn ok(elapsed: Duration) -> Self {
        Self {
            elapsed,
            outcome: Ok(()),
        }
    }

    /// A failed transfer.
    pub fn failed(elapsed: Duration, error: RepoError) -> Self {
        Self {
            elapsed,
            outcome: Err(error),
        }
    }
}

/// Datastore capability consumed by the workload loop and readiness gate.
#[async_trait]
pub trait Repo: Send + Sync {
    /// Provision `entity_count` entities holding `initial_balance` each.
    async fn init(&self, entity_count: usize, initial_balance: f64) -> Result<(), RepoError>;

    /// Remove everything `init` created. Safe on an empty store.
    async fn deinit(&self) -> Result<(), RepoError>;

    /// Return up to `count` entity ids. Order is not significant.
    async fn fetch_ids(&self, count: usize) -> Result<Vec<EntityId>, RepoError>;

    /// Atomically move `amount` from `from` to `to`.
    async fn perform_transfer(&self, from: &EntityId, to: &EntityId, amount: f64)
        -> TransferReport;

    /// Whether the datastore currently meets its health criterion.
    async fn is_ready(&self) -> Result<bool, RepoError>;
}
