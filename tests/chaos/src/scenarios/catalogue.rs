//! Full runs over the experiment catalogue.

use super::support::config;
use crate::assertions::{
    assert_all_withdrawn, assert_no_overlap, assert_results_consistent, assert_unique_names,
};
use chaos_core::{Harness, MockOrchestrator, MockRepo, NullReporter, RunOutcome};
use chaos_types::{DiskLatency, ExperimentKind};
use std::sync::Arc;
use std::time::Duration;

fn never() -> impl std::future::Future<Output = ()> {
    std::future::pending()
}

/// Three pods: 3 failures, 3 kills, 6 symmetric and 6 asymmetric partitions.
#[tokio::test(start_paused = true)]
async fn three_pods_run_full_catalogue() {
    let repo = MockRepo::new(100);
    let orch = MockOrchestrator::new(vec!["db-2", "db-0", "db-1"]);
    let harness = Harness::new(
        Arc::new(repo.clone()),
        Arc::new(orch.clone()),
        config(),
        Arc::new(NullReporter),
    );

    let summary = harness.run(never()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.results.total_errors, 0);

    let submitted = orch.submitted();
    assert_eq!(submitted.len(), 18);

    let count = |kind: ExperimentKind| submitted.iter().filter(|d| d.experiment == kind).count();
    assert_eq!(count(ExperimentKind::ProcessFailure), 3);
    assert_eq!(count(ExperimentKind::ProcessKill), 3);
    assert_eq!(count(ExperimentKind::PartitionSymmetric), 6);
    assert_eq!(count(ExperimentKind::PartitionAsymmetric), 6);
    assert_eq!(count(ExperimentKind::DiskLatency), 0);

    // Pods are sorted before use.
    assert_eq!(submitted[0].name(), "db-0-pod-failure");
    assert_eq!(submitted[3].name(), "db-0-pod-kill");

    for check in [
        assert_all_withdrawn(&orch),
        assert_no_overlap(&orch.events()),
        assert_unique_names(&submitted),
        assert_results_consistent(&summary.results),
    ] {
        assert!(check.passed, "{}: {:?}", check.description, check.failure_details);
    }

    assert!(repo.transfer_count() > 0);
}

#[tokio::test(start_paused = true)]
async fn disk_latency_runs_last_when_configured() {
    let orch = MockOrchestrator::new(vec!["db-0", "db-1"]);
    let mut config = config();
    config.sequencer.disk_latency = Some(DiskLatency {
        volume_path: "/var/lib/postgresql/data".into(),
        path: "*".into(),
        delay: Duration::from_millis(100),
        percent: 100,
    });
    let harness = Harness::new(
        Arc::new(MockRepo::new(100)),
        Arc::new(orch.clone()),
        config,
        Arc::new(NullReporter),
    );

    let summary = harness.run(never()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    let submitted = orch.submitted();
    // 2 failures, 2 kills, 2 + 2 partitions, 2 disk latency.
    assert_eq!(submitted.len(), 10);
    assert!(submitted[8..]
        .iter()
        .all(|d| d.experiment == ExperimentKind::DiskLatency));
    assert!(assert_all_withdrawn(&orch).passed);
}

#[tokio::test(start_paused = true)]
async fn reseed_before_run() {
    let repo = MockRepo::new(0);
    let mut config = config();
    config.reseed = true;
    let harness = Harness::new(
        Arc::new(repo.clone()),
        Arc::new(MockOrchestrator::new(vec!["db-0"])),
        config,
        Arc::new(NullReporter),
    );

    let summary = harness.run(never()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(repo.deinit_calls(), 1);
    assert_eq!(repo.init_calls(), vec![(100, 1_000.0)]);
    assert!(repo.transfer_count() > 0);
}
