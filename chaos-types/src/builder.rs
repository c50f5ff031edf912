//! Descriptor builders, one per experiment kind.
//!
//! Pure functions: no I/O, no retries. Names are derived from the target(s)
//! and action only, so the same experiment against the same pod always gets
//! the same resource name. That keeps reruns recognisable and lets a stray
//! resource be cleaned up by hand with a predictable `kubectl delete`.

use std::time::Duration;

use crate::error::DescriptorError;
use crate::experiment::{
    Direction, ExperimentDescriptor, ExperimentKind, ExperimentSpec, IoSpec, Metadata,
    NetworkSpec, PodSpec, Selector, Target, API_VERSION,
};

/// Parameters for a disk latency experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLatency {
    /// Mount point of the data volume inside the container
    pub volume_path: String,
    /// File glob the fault applies to
    pub path: String,
    /// Delay added to each affected I/O operation
    pub delay: Duration,
    /// Percentage of operations delayed (1-100)
    pub percent: u8,
}

/// Make one pod unavailable for `duration`.
pub fn pod_failure(
    pod: &str,
    pod_ns: &str,
    chaos_ns: &str,
    duration: Duration,
) -> Result<ExperimentDescriptor, DescriptorError> {
    pod_chaos(
        ExperimentKind::ProcessFailure,
        pod,
        pod_ns,
        chaos_ns,
        Some(duration),
    )
}

/// Kill one pod.
pub fn pod_kill(
    pod: &str,
    pod_ns: &str,
    chaos_ns: &str,
) -> Result<ExperimentDescriptor, DescriptorError> {
    pod_chaos(ExperimentKind::ProcessKill, pod, pod_ns, chaos_ns, None)
}

/// Partition `source` and `target` in both directions.
pub fn symmetric_partition(
    source: &str,
    target: &str,
    pod_ns: &str,
    chaos_ns: &str,
) -> Result<ExperimentDescriptor, DescriptorError> {
    partition(
        ExperimentKind::PartitionSymmetric,
        Direction::Both,
        source,
        target,
        pod_ns,
        chaos_ns,
    )
}

/// Drop traffic from `source` to `target` only.
pub fn asymmetric_partition(
    source: &str,
    target: &str,
    pod_ns: &str,
    chaos_ns: &str,
) -> Result<ExperimentDescriptor, DescriptorError> {
    partition(
        ExperimentKind::PartitionAsymmetric,
        Direction::To,
        source,
        target,
        pod_ns,
        chaos_ns,
    )
}

/// Delay a share of I/O on one pod's volume for `duration`.
pub fn disk_latency(
    pod: &str,
    pod_ns: &str,
    chaos_ns: &str,
    params: &DiskLatency,
    duration: Duration,
) -> Result<ExperimentDescriptor, DescriptorError> {
    check_inputs(pod, pod_ns, chaos_ns)?;
    if params.volume_path.is_empty() {
        return Err(DescriptorError::EmptyVolumePath);
    }
    if params.percent == 0 || params.percent > 100 {
        return Err(DescriptorError::InvalidPercent(params.percent));
    }

    let kind = ExperimentKind::DiskLatency;
    Ok(ExperimentDescriptor {
        api_version: API_VERSION.into(),
        kind: kind.resource_kind().into(),
        metadata: Metadata {
            name: format!("{}-{}", pod, kind.action()),
            namespace: chaos_ns.into(),
        },
        spec: ExperimentSpec::Io(IoSpec {
            action: kind.action().into(),
            mode: "one".into(),
            selector: Selector::pod(pod_ns, pod),
            volume_path: params.volume_path.clone(),
            path: params.path.clone(),
            delay: go_duration(params.delay),
            percent: params.percent,
            duration: go_duration(duration),
        }),
        experiment: kind,
    })
}

fn pod_chaos(
    kind: ExperimentKind,
    pod: &str,
    pod_ns: &str,
    chaos_ns: &str,
    duration: Option<Duration>,
) -> Result<ExperimentDescriptor, DescriptorError> {
    check_inputs(pod, pod_ns, chaos_ns)?;

    Ok(ExperimentDescriptor {
        api_version: API_VERSION.into(),
        kind: kind.resource_kind().into(),
        metadata: Metadata {
            name: format!("{}-{}", pod, kind.action()),
            namespace: chaos_ns.into(),
        },
        spec: ExperimentSpec::Pod(PodSpec {
            action: kind.action().into(),
            mode: "one".into(),
            duration: duration.map(go_duration),
            selector: Selector::pod(pod_ns, pod),
        }),
        experiment: kind,
    })
}

fn partition(
    kind: ExperimentKind,
    direction: Direction,
    source: &str,
    target: &str,
    pod_ns: &str,
    chaos_ns: &str,
) -> Result<ExperimentDescriptor, DescriptorError> {
    check_inputs(source, pod_ns, chaos_ns)?;
    if target.is_empty() {
        return Err(DescriptorError::EmptyTarget);
    }
    if source == target {
        return Err(DescriptorError::SelfPartition(source.into()));
    }

    Ok(ExperimentDescriptor {
        api_version: API_VERSION.into(),
        kind: kind.resource_kind().into(),
        metadata: Metadata {
            name: format!(
                "{}-{}-{}-{}",
                source,
                target,
                kind.action(),
                direction.as_str()
            ),
            namespace: chaos_ns.into(),
        },
        spec: ExperimentSpec::Network(NetworkSpec {
            action: kind.action().into(),
            mode: "all".into(),
            selector: Selector::pod(pod_ns, source),
            direction,
            target: Target {
                mode: "one".into(),
                selector: Selector::pod(pod_ns, target),
            },
        }),
        experiment: kind,
    })
}

fn check_inputs(pod: &str, pod_ns: &str, chaos_ns: &str) -> Result<(), DescriptorError> {
    if pod.is_empty() {
        return Err(DescriptorError::EmptyTarget);
    }
    if pod_ns.is_empty() {
        return Err(DescriptorError::EmptyNamespace("pod"));
    }
    if chaos_ns.is_empty() {
        return Err(DescriptorError::EmptyNamespace("chaos"));
    }
    Ok(())
}

/// Render a duration the way Chaos Mesh parses it (`30s`, `250ms`).
pub fn go_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
