//! Workload failures are attributed to the experiment that caused them.

use super::support::config;
use crate::assertions::{assert_all_withdrawn, assert_results_consistent};
use crate::flaky::FlakyRepo;
use chaos_core::{
    ExperimentStats, Harness, MockOrchestrator, MockRepo, RecordingReporter, RunOutcome,
};
use chaos_types::ExperimentKind;
use std::sync::Arc;
use std::time::Duration;

/// One pod, one failed transfer while it is being killed.
#[tokio::test(start_paused = true)]
async fn kill_failure_counted_under_process_kill() {
    let orch = MockOrchestrator::new(vec!["db-0"]);
    let repo = FlakyRepo::new(MockRepo::new(100), orch.clone(), ExperimentKind::ProcessKill)
        .with_budget(1)
        .with_downtime(Duration::from_millis(50));
    let reporter = Arc::new(RecordingReporter::new());
    let harness = Harness::new(
        Arc::new(repo.clone()),
        Arc::new(orch.clone()),
        config(),
        reporter.clone(),
    );

    let summary = harness.run(std::future::pending()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(repo.injected(), 1);

    let results = &summary.results;
    assert_eq!(results.total_errors, 1);
    assert_eq!(results.total_downtime, Duration::from_millis(50));
    assert_eq!(
        results.stats_for("process-kill"),
        ExperimentStats {
            error_count: 1,
            downtime: Duration::from_millis(50),
        }
    );
    assert_eq!(results.stats.len(), 1);
    assert_eq!(reporter.failures(), vec!["process-kill".to_string()]);

    assert!(assert_results_consistent(results).passed);
    assert!(assert_all_withdrawn(&orch).passed);
}

/// Every transfer during every partition fails; nothing leaks into other
/// labels.
#[tokio::test(start_paused = true)]
async fn partition_failures_stay_under_their_label() {
    let orch = MockOrchestrator::new(vec!["db-0", "db-1"]);
    let repo = FlakyRepo::new(
        MockRepo::new(100),
        orch.clone(),
        ExperimentKind::PartitionSymmetric,
    );
    let harness = Harness::new(
        Arc::new(repo.clone()),
        Arc::new(orch.clone()),
        config(),
        Arc::new(RecordingReporter::new()),
    );

    let summary = harness.run(std::future::pending()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    let results = &summary.results;
    assert_eq!(u64::from(repo.injected()), results.total_errors);
    assert!(results.total_errors > 0);
    assert_eq!(
        results.stats.keys().collect::<Vec<_>>(),
        vec!["partition-symmetric"]
    );
    assert!(assert_results_consistent(results).passed);
}
