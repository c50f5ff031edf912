//! Chaos Mesh object model.
//!
//! Experiments are submitted as namespaced custom resources of the
//! `chaos-mesh.org/v1alpha1` API group. Field names follow the Chaos Mesh
//! CRDs so a descriptor serializes straight into a request body.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API group and version of every Chaos Mesh resource we create.
pub const API_VERSION: &str = "chaos-mesh.org/v1alpha1";

/// Label published while no experiment class is running.
pub const QUIESCENT: &str = "";

/// Pod label Chaos Mesh selectors match on (one pod per StatefulSet ordinal).
pub const POD_NAME_LABEL: &str = "statefulset.kubernetes.io/pod-name";

/// The fixed catalogue of failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperimentKind {
    /// Make one pod unavailable for the hold duration
    ProcessFailure,
    /// Kill one pod
    ProcessKill,
    /// Partition two pods in both directions
    PartitionSymmetric,
    /// Partition traffic from one pod to another only
    PartitionAsymmetric,
    /// Inject I/O latency into one pod's volume
    DiskLatency,
}

impl ExperimentKind {
    /// Every kind, in catalogue order.
    pub const ALL: [ExperimentKind; 5] = [
        ExperimentKind::ProcessFailure,
        ExperimentKind::ProcessKill,
        ExperimentKind::PartitionSymmetric,
        ExperimentKind::PartitionAsymmetric,
        ExperimentKind::DiskLatency,
    ];

    /// Label used to attribute workload failures to this class.
    pub fn label(&self) -> &'static str {
        match self {
            ExperimentKind::ProcessFailure => "process-failure",
            ExperimentKind::ProcessKill => "process-kill",
            ExperimentKind::PartitionSymmetric => "partition-symmetric",
            ExperimentKind::PartitionAsymmetric => "partition-asymmetric",
            ExperimentKind::DiskLatency => "disk-latency",
        }
    }

    /// Chaos Mesh resource kind.
    pub fn resource_kind(&self) -> &'static str {
        match self {
            ExperimentKind::ProcessFailure | ExperimentKind::ProcessKill => "PodChaos",
            ExperimentKind::PartitionSymmetric | ExperimentKind::PartitionAsymmetric => {
                "NetworkChaos"
            }
            ExperimentKind::DiskLatency => "IOChaos",
        }
    }

    /// Plural resource name used in API paths.
    pub fn resource_plural(&self) -> &'static str {
        match self {
            ExperimentKind::ProcessFailure | ExperimentKind::ProcessKill => "podchaos",
            ExperimentKind::PartitionSymmetric | ExperimentKind::PartitionAsymmetric => {
                "networkchaos"
            }
            ExperimentKind::DiskLatency => "iochaos",
        }
    }

    /// Chaos Mesh action for this kind.
    pub fn action(&self) -> &'static str {
        match self {
            ExperimentKind::ProcessFailure => "pod-failure",
            ExperimentKind::ProcessKill => "pod-kill",
            ExperimentKind::PartitionSymmetric | ExperimentKind::PartitionAsymmetric => {
                "partition"
            }
            ExperimentKind::DiskLatency => "latency",
        }
    }

    /// Whether this kind targets an ordered pair of pods rather than one pod.
    pub fn is_pairwise(&self) -> bool {
        matches!(
            self,
            ExperimentKind::PartitionSymmetric | ExperimentKind::PartitionAsymmetric
        )
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Traffic direction for a network partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Drop traffic both ways between source and target
    Both,
    /// Drop traffic from source to target only
    To,
}

impl Direction {
    /// Get the direction as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Both => "both",
            Direction::To => "to",
        }
    }
}

/// Object metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Resource name
    pub name: String,
    /// Namespace the resource is created in
    pub namespace: String,
}

/// Pod selection by namespace and pod-name label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// Namespaces to select pods from
    pub namespaces: Vec<String>,
    /// Label selectors
    pub label_selectors: LabelSelectors,
}

impl Selector {
    /// Select exactly one pod by name.
    pub fn pod(namespace: &str, pod: &str) -> Self {
        Self {
            namespaces: vec![namespace.to_string()],
            label_selectors: LabelSelectors {
                pod_name: pod.to_string(),
            },
        }
    }
}

/// Label selectors understood by Chaos Mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectors {
    /// StatefulSet pod name
    #[serde(rename = "statefulset.kubernetes.io/pod-name")]
    pub pod_name: String,
}

/// PodChaos spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    /// `pod-failure` or `pod-kill`
    pub action: String,
    /// Selection mode
    pub mode: String,
    /// How long the failure lasts (pod-failure only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Target pod
    pub selector: Selector,
}

/// Target of a network partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Selection mode
    pub mode: String,
    /// Target pod
    pub selector: Selector,
}

/// NetworkChaos spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Always `partition`
    pub action: String,
    /// Selection mode
    pub mode: String,
    /// Source pod
    pub selector: Selector,
    /// Which traffic is dropped
    pub direction: Direction,
    /// Destination pod
    pub target: Target,
}

/// IOChaos spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoSpec {
    /// Always `latency`
    pub action: String,
    /// Selection mode
    pub mode: String,
    /// Target pod
    pub selector: Selector,
    /// Mount point of the volume inside the container
    pub volume_path: String,
    /// File glob the fault applies to
    pub path: String,
    /// Injected delay per I/O operation
    pub delay: String,
    /// Percentage of operations delayed
    pub percent: u8,
    /// How long the fault lasts
    pub duration: String,
}

/// Kind-specific spec of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExperimentSpec {
    /// PodChaos spec
    Pod(PodSpec),
    /// NetworkChaos spec
    Network(NetworkSpec),
    /// IOChaos spec
    Io(IoSpec),
}

/// A single failure experiment, ready to submit.
///
/// Built immediately before submission and discarded after withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentDescriptor {
    /// Always [`API_VERSION`]
    pub api_version: String,
    /// Chaos Mesh resource kind
    pub kind: String,
    /// Name and namespace
    pub metadata: Metadata,
    /// Kind-specific spec
    pub spec: ExperimentSpec,
    /// Which catalogue entry produced this descriptor
    #[serde(skip)]
    pub experiment: ExperimentKind,
}

impl ExperimentDescriptor {
    /// Resource name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace the resource is created in.
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }
}
