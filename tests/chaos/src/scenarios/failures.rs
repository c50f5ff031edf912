//! Runs that stop early or are interrupted.

use super::support::config;
use crate::assertions::{assert_all_withdrawn, assert_results_consistent};
use chaos_core::{Harness, MockOrchestrator, MockRepo, NullReporter, RunOutcome};
use std::sync::Arc;
use std::time::Duration;

fn harness(repo: &MockRepo, orch: &MockOrchestrator) -> Harness {
    Harness::new(
        Arc::new(repo.clone()),
        Arc::new(orch.clone()),
        config(),
        Arc::new(NullReporter),
    )
}

#[tokio::test(start_paused = true)]
async fn submit_failure_stops_run_with_results() {
    let repo = MockRepo::new(100);
    let orch = MockOrchestrator::new(vec!["db-0", "db-1"]);
    orch.fail_submit_at(2, "admission webhook denied");

    let summary = harness(&repo, &orch).run(std::future::pending()).await.unwrap();

    match &summary.outcome {
        RunOutcome::Failed(reason) => assert!(reason.contains("admission webhook denied")),
        other => panic!("expected failure, got {other}"),
    }
    assert_eq!(orch.withdrawn(), vec!["db-0-pod-failure".to_string()]);
    assert!(assert_all_withdrawn(&orch).passed);
    assert!(repo.transfer_count() > 0);
    assert!(assert_results_consistent(&summary.results).passed);
}

#[tokio::test(start_paused = true)]
async fn interrupt_mid_hold_withdraws_experiment() {
    let repo = MockRepo::new(100);
    let orch = MockOrchestrator::new(vec!["db-0", "db-1", "db-2"]);

    // Warm-up 2s, first readiness poll at 3s, held until 13s.
    let shutdown = tokio::time::sleep(Duration::from_secs(8));
    let summary = harness(&repo, &orch).run(shutdown).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Interrupted);
    assert_eq!(orch.submitted().len(), 1);
    assert_eq!(orch.withdrawn(), vec!["db-0-pod-failure".to_string()]);
    assert_eq!(orch.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn never_ready_fails_before_first_submission() {
    let repo = MockRepo::new(100);
    repo.set_default_ready(false);
    let orch = MockOrchestrator::new(vec!["db-0"]);

    let summary = harness(&repo, &orch).run(std::future::pending()).await.unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Failed(_)));
    assert!(orch.submitted().is_empty());
    // Polls at 1s..4s; the 5s deadline wins over the fifth tick.
    assert_eq!(repo.ready_polls(), 4);
}

#[tokio::test(start_paused = true)]
async fn discovery_failure_fails_run() {
    let repo = MockRepo::new(100);
    let orch = MockOrchestrator::new(vec![]);
    orch.fail_list("pods is forbidden");

    let summary = harness(&repo, &orch).run(std::future::pending()).await.unwrap();

    match &summary.outcome {
        RunOutcome::Failed(reason) => assert!(reason.contains("pods is forbidden")),
        other => panic!("expected failure, got {other}"),
    }
    assert!(orch.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn workload_setup_failure_is_an_error() {
    let repo = MockRepo::new(100);
    repo.fail_fetch("relation \"account\" does not exist");
    let orch = MockOrchestrator::new(vec!["db-0"]);

    let result = harness(&repo, &orch).run(std::future::pending()).await;

    assert!(result.is_err());
    assert!(orch.submitted().is_empty());
}
