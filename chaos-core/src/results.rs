//! Failure statistics, global and per experiment label.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Failures observed while one label was active.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExperimentStats {
    /// Failed transfers.
    pub error_count: u64,
    /// Summed elapsed time of the failed transfers.
    pub downtime: Duration,
}

/// Final statistics of a run.
///
/// The empty label `""` collects failures seen while no experiment was
/// active; in a healthy run it stays at zero.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Results {
    /// Failed transfers across all labels.
    pub total_errors: u64,
    /// Downtime across all labels.
    pub total_downtime: Duration,
    /// Per-label breakdown, ordered by label.
    pub stats: BTreeMap<String, ExperimentStats>,
}

impl Results {
    /// Stats for `label`, zero if nothing was recorded under it.
    pub fn stats_for(&self, label: &str) -> ExperimentStats {
        self.stats.get(label).copied().unwrap_or_default()
    }

    /// True when the totals equal the sums over labels.
    pub fn is_consistent(&self) -> bool {
        let errors: u64 = self.stats.values().map(|s| s.error_count).sum();
        let downtime: Duration = self.stats.values().map(|s| s.downtime).sum();
        errors == self.total_errors && downtime == self.total_downtime
    }
}

/// Accumulates failures for the workload loop.
///
/// Confined to the workload loop's task; there is never more than one
/// writer.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Results,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one failure under `label`.
    pub fn record_failure(&mut self, label: &str, downtime: Duration) {
        self.results.total_errors += 1;
        self.results.total_downtime += downtime;

        let stats = self.results.stats.entry(label.to_string()).or_default();
        stats.error_count += 1;
        stats.downtime += downtime;
    }

    /// Failures so far.
    pub fn total_errors(&self) -> u64 {
        self.results.total_errors
    }

    /// Downtime so far.
    pub fn total_downtime(&self) -> Duration {
        self.results.total_downtime
    }

    /// Final results. Consumes the aggregator.
    pub fn snapshot(self) -> Results {
        self.results
    }
}
