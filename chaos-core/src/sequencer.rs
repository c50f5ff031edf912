//! The chaos sequencer.
//!
//! Walks the experiment catalogue strictly in sequence. Each experiment is
//! gated on the datastore reporting ready, submitted, held, then withdrawn
//! before the next one starts, so at most one experiment is ever active.

use crate::error::SequencerError;
use crate::labels::LabelSender;
use crate::orchestrator::{HeldExperiment, Orchestrator, PendingWithdrawals};
use crate::readiness::{ReadinessConfig, ReadinessGate};
use crate::report::{ExperimentEvent, Reporter};
use crate::repo::Repo;
use chaos_types::{
    builder, DescriptorError, DiskLatency, ExperimentDescriptor, ExperimentKind, QUIESCENT,
};
use std::sync::Arc;
use std::time::Duration;

/// Sequencer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    /// Namespace the datastore pods run in.
    pub target_namespace: String,
    /// Namespace experiment resources are created in.
    pub chaos_namespace: String,
    /// How long each experiment stays applied.
    pub hold_duration: Duration,
    /// Readiness polling between experiments.
    pub readiness: ReadinessConfig,
    /// Disk latency profile. The disk-latency class only runs when set.
    pub disk_latency: Option<DiskLatency>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            target_namespace: "default".into(),
            chaos_namespace: "chaos-mesh".into(),
            hold_duration: Duration::from_secs(30),
            readiness: ReadinessConfig::default(),
            disk_latency: None,
        }
    }
}

/// Every ordered pair `(a, b)` with `a != b`, in input order.
///
/// Both `(a, b)` and `(b, a)` are produced, so each unordered pair appears
/// twice.
pub fn ordered_pairs(instances: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(instances.len() * instances.len().saturating_sub(1));
    for (i, source) in instances.iter().enumerate() {
        for (j, target) in instances.iter().enumerate() {
            if i != j {
                pairs.push((source.clone(), target.clone()));
            }
        }
    }
    pairs
}

/// What one experiment is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Pod(String),
    Pair(String, String),
}

/// Drives the experiment catalogue and publishes a label per class.
pub struct ChaosSequencer {
    repo: Arc<dyn Repo>,
    orchestrator: Arc<dyn Orchestrator>,
    config: SequencerConfig,
    gate: ReadinessGate,
    reporter: Arc<dyn Reporter>,
    pending: PendingWithdrawals,
}

impl ChaosSequencer {
    /// Create a sequencer.
    pub fn new(
        repo: Arc<dyn Repo>,
        orchestrator: Arc<dyn Orchestrator>,
        config: SequencerConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let gate = ReadinessGate::new(config.readiness);
        Self {
            repo,
            orchestrator,
            config,
            gate,
            reporter,
            pending: PendingWithdrawals::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Withdrawals scheduled by experiments dropped mid-hold.
    ///
    /// Await this after aborting [`run`](Self::run) to make sure nothing is
    /// left applied.
    pub fn pending_withdrawals(&self) -> PendingWithdrawals {
        self.pending.clone()
    }

    /// Classes this sequencer runs, in order.
    pub fn catalogue(&self) -> Vec<ExperimentKind> {
        ExperimentKind::ALL
            .into_iter()
            .filter(|kind| {
                *kind != ExperimentKind::DiskLatency || self.config.disk_latency.is_some()
            })
            .collect()
    }

    /// Run the whole catalogue.
    ///
    /// `labels` is dropped on return, which closes the channel and ends the
    /// workload loop whether the catalogue completed or not.
    pub async fn run(&self, labels: LabelSender) -> Result<(), SequencerError> {
        let mut instances = self
            .orchestrator
            .list_service_instances(&self.config.target_namespace)
            .await
            .map_err(SequencerError::Discovery)?;
        if instances.is_empty() {
            return Err(SequencerError::NoInstances(
                self.config.target_namespace.clone(),
            ));
        }
        instances.sort();
        self.reporter
            .experiment(&ExperimentEvent::Instances(instances.clone()));

        for kind in self.catalogue() {
            self.run_class(kind, &instances, &labels).await?;
        }

        tracing::info!("experiment catalogue complete");
        Ok(())
    }

    async fn run_class(
        &self,
        kind: ExperimentKind,
        instances: &[String],
        labels: &LabelSender,
    ) -> Result<(), SequencerError> {
        labels.publish(kind.label()).await?;
        self.reporter
            .experiment(&ExperimentEvent::ClassStarted(kind.label().to_string()));

        let result = self.run_targets(kind, instances).await;

        // Failures after this point are no longer attributed to the class.
        let reset = labels.publish(QUIESCENT).await;
        result?;
        reset?;

        self.reporter
            .experiment(&ExperimentEvent::ClassFinished(kind.label().to_string()));
        Ok(())
    }

    async fn run_targets(
        &self,
        kind: ExperimentKind,
        instances: &[String],
    ) -> Result<(), SequencerError> {
        let targets: Vec<Target> = if kind.is_pairwise() {
            ordered_pairs(instances)
                .into_iter()
                .map(|(source, target)| Target::Pair(source, target))
                .collect()
        } else {
            instances.iter().cloned().map(Target::Pod).collect()
        };

        for target in &targets {
            self.run_experiment(kind, target).await?;
        }
        Ok(())
    }

    async fn run_experiment(
        &self,
        kind: ExperimentKind,
        target: &Target,
    ) -> Result<(), SequencerError> {
        let label = kind.label();

        self.gate
            .wait_for_ready(self.repo.as_ref(), self.reporter.as_ref())
            .await
            .map_err(|source| SequencerError::Readiness { label, source })?;

        let descriptor = self
            .descriptor(kind, target)
            .map_err(|source| SequencerError::Descriptor { label, source })?;

        let held = HeldExperiment::submit(
            Arc::clone(&self.orchestrator),
            &descriptor,
            self.pending.clone(),
        )
        .await
        .map_err(|source| SequencerError::Orchestration { label, source })?;
        let name = held.handle().name.clone();
        self.reporter.experiment(&ExperimentEvent::Applied(name.clone()));

        tokio::time::sleep(self.config.hold_duration).await;

        held.withdraw()
            .await
            .map_err(|source| SequencerError::Orchestration { label, source })?;
        self.reporter.experiment(&ExperimentEvent::Withdrawn(name));
        Ok(())
    }

    fn descriptor(
        &self,
        kind: ExperimentKind,
        target: &Target,
    ) -> Result<ExperimentDescriptor, DescriptorError> {
        let pod_ns = self.config.target_namespace.as_str();
        let chaos_ns = self.config.chaos_namespace.as_str();
        let hold = self.config.hold_duration;

        match (kind, target) {
            (ExperimentKind::ProcessFailure, Target::Pod(pod)) => {
                builder::pod_failure(pod, pod_ns, chaos_ns, hold)
            }
            (ExperimentKind::ProcessKill, Target::Pod(pod)) => {
                builder::pod_kill(pod, pod_ns, chaos_ns)
            }
            (ExperimentKind::PartitionSymmetric, Target::Pair(source, target)) => {
                builder::symmetric_partition(source, target, pod_ns, chaos_ns)
            }
            (ExperimentKind::PartitionAsymmetric, Target::Pair(source, target)) => {
                builder::asymmetric_partition(source, target, pod_ns, chaos_ns)
            }
            (ExperimentKind::DiskLatency, Target::Pod(pod)) => {
                let params = self
                    .config
                    .disk_latency
                    .as_ref()
                    .ok_or(DescriptorError::EmptyVolumePath)?;
                builder::disk_latency(pod, pod_ns, chaos_ns, params, hold)
            }
            // Targets follow `is_pairwise`, so no other shape is built.
            _ => Err(DescriptorError::EmptyTarget),
        }
    }
}
