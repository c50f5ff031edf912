//! Error types for experiment descriptors.

use thiserror::Error;

/// Errors raised when a descriptor cannot be built from its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Target pod name was empty
    #[error("empty target")]
    EmptyTarget,

    /// Namespace was empty
    #[error("empty namespace: {0}")]
    EmptyNamespace(&'static str),

    /// Partition source and target are the same pod
    #[error("partition source and target are both {0}")]
    SelfPartition(String),

    /// Disk latency percentage outside 1..=100
    #[error("invalid percent: {0} (expected 1-100)")]
    InvalidPercent(u8),

    /// Disk latency volume path was empty
    #[error("empty volume path")]
    EmptyVolumePath,
}
