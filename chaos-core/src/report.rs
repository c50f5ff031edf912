//! Reporting interface for the workload loop and the chaos sequencer.
//!
//! Observability output goes through an injected [`Reporter`] rather than
//! process-wide console state. It is informational only: nothing reported
//! here feeds back into the results.

use crate::repo::RepoError;
use std::sync::Mutex;
use std::time::Duration;

/// Running totals after one workload tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Elapsed time of this tick's transfer.
    pub latency: Duration,
    /// Failures so far.
    pub errors: u64,
    /// Downtime so far.
    pub downtime: Duration,
}

/// Something the chaos sequencer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentEvent {
    /// Target instances discovered.
    Instances(Vec<String>),
    /// An experiment class started.
    ClassStarted(String),
    /// An experiment class finished.
    ClassFinished(String),
    /// Waiting for the datastore before the next experiment.
    WaitingForReady,
    /// Datastore reported ready.
    Ready,
    /// A readiness poll errored (retried).
    ReadinessCheckFailed(String),
    /// Experiment resource created.
    Applied(String),
    /// Experiment resource deleted.
    Withdrawn(String),
}

/// Sink for run observability.
pub trait Reporter: Send + Sync {
    /// One workload tick completed.
    fn tick(&self, progress: &Progress);

    /// A transfer failed and was counted under `label`.
    fn transfer_failed(&self, label: &str, error: &RepoError);

    /// The sequencer made progress.
    fn experiment(&self, event: &ExperimentEvent);
}

/// Reporter that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn tick(&self, progress: &Progress) {
        tracing::info!(
            target: "db_chaos::workload",
            "latency: {}ms, errors: {}, total downtime: {:.2}s",
            progress.latency.as_millis(),
            progress.errors,
            progress.downtime.as_secs_f64()
        );
    }

    fn transfer_failed(&self, label: &str, error: &RepoError) {
        tracing::warn!(target: "db_chaos::workload", experiment = label, "error: {}", error);
    }

    fn experiment(&self, event: &ExperimentEvent) {
        match event {
            ExperimentEvent::Instances(pods) => {
                tracing::info!(target: "db_chaos::chaos", "pods: {:?}", pods)
            }
            ExperimentEvent::ClassStarted(label) => {
                tracing::info!(target: "db_chaos::chaos", "running {}", label)
            }
            ExperimentEvent::ClassFinished(label) => {
                tracing::info!(target: "db_chaos::chaos", "finished {}", label)
            }
            ExperimentEvent::WaitingForReady => {
                tracing::info!(target: "db_chaos::chaos", "waiting for database to be ready...")
            }
            ExperimentEvent::Ready => {
                tracing::info!(target: "db_chaos::chaos", "database ready for next experiment")
            }
            ExperimentEvent::ReadinessCheckFailed(e) => {
                tracing::warn!(target: "db_chaos::chaos", "error checking readiness: {}", e)
            }
            ExperimentEvent::Applied(name) => {
                tracing::info!(target: "db_chaos::chaos", "applied chaos: {}", name)
            }
            ExperimentEvent::Withdrawn(name) => {
                tracing::info!(target: "db_chaos::chaos", "deleted chaos: {}", name)
            }
        }
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn tick(&self, _progress: &Progress) {}

    fn transfer_failed(&self, _label: &str, _error: &RepoError) {}

    fn experiment(&self, _event: &ExperimentEvent) {}
}

/// Reporter that keeps everything in memory (for tests).
#[derive(Debug, Default)]
pub struct RecordingReporter {
    ticks: Mutex<Vec<Progress>>,
    failures: Mutex<Vec<String>>,
    events: Mutex<Vec<ExperimentEvent>>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tick reported so far.
    pub fn ticks(&self) -> Vec<Progress> {
        self.ticks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Labels of every failure reported so far.
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Every sequencer event reported so far.
    pub fn events(&self) -> Vec<ExperimentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn tick(&self, progress: &Progress) {
        if let Ok(mut ticks) = self.ticks.lock() {
            ticks.push(*progress);
        }
    }

    fn transfer_failed(&self, label: &str, _error: &RepoError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(label.to_string());
        }
    }

    fn experiment(&self, event: &ExperimentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
