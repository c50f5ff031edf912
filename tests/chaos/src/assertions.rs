//! Assertion helpers for chaos runs.
//!
//! These are pure functions over what a run left behind: the orchestrator's
//! submit/withdraw log and the final results. They return pass/fail rather
//! than panicking so scenarios can report every broken invariant.

use chaos_core::{MockOrchestrator, Results};
use chaos_types::ExperimentDescriptor;
use std::collections::HashSet;

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }
}

/// Assert that every submitted experiment was withdrawn and nothing is
/// still held.
pub fn assert_all_withdrawn(orchestrator: &MockOrchestrator) -> AssertionResult {
    let withdrawn: HashSet<String> = orchestrator.withdrawn().into_iter().collect();

    for descriptor in orchestrator.submitted() {
        if !withdrawn.contains(descriptor.name()) {
            return AssertionResult::fail(
                "All experiments withdrawn",
                &format!("{} was submitted but never withdrawn", descriptor.name()),
            );
        }
    }

    if orchestrator.active_count() > 0 {
        return AssertionResult::fail(
            "All experiments withdrawn",
            &format!("{} experiments still active", orchestrator.active_count()),
        );
    }

    AssertionResult::pass(&format!(
        "All {} experiments withdrawn",
        orchestrator.submitted().len()
    ))
}

/// Assert that experiments ran one at a time.
///
/// `events` is a `submit:<name>` / `withdraw:<name>` log. Each submit must
/// be followed by the withdrawal of the same experiment before the next
/// submit.
pub fn assert_no_overlap(events: &[String]) -> AssertionResult {
    let mut active: Option<&str> = None;

    for event in events {
        if let Some(name) = event.strip_prefix("submit:") {
            if let Some(held) = active {
                return AssertionResult::fail(
                    "No overlapping experiments",
                    &format!("{name} submitted while {held} was still active"),
                );
            }
            active = Some(name);
        } else if let Some(name) = event.strip_prefix("withdraw:") {
            if active != Some(name) {
                return AssertionResult::fail(
                    "No overlapping experiments",
                    &format!("{name} withdrawn but {active:?} was active"),
                );
            }
            active = None;
        }
    }

    AssertionResult::pass(&format!("{} events, never overlapping", events.len()))
}

/// Assert that no two submitted experiments share a name.
pub fn assert_unique_names(submitted: &[ExperimentDescriptor]) -> AssertionResult {
    let mut seen = HashSet::new();

    for descriptor in submitted {
        if !seen.insert(descriptor.name()) {
            return AssertionResult::fail(
                "Unique experiment names",
                &format!("{} submitted twice", descriptor.name()),
            );
        }
    }

    AssertionResult::pass(&format!("{} distinct experiment names", seen.len()))
}

/// Assert that the totals equal the sums over the per-label breakdown.
pub fn assert_results_consistent(results: &Results) -> AssertionResult {
    if results.is_consistent() {
        AssertionResult::pass(&format!(
            "{} errors across {} labels",
            results.total_errors,
            results.stats.len()
        ))
    } else {
        AssertionResult::fail(
            "Results consistent",
            &format!(
                "totals ({} errors, {:?}) disagree with breakdown {:?}",
                results.total_errors, results.total_downtime, results.stats
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_core::{ExperimentStats, Orchestrator};
    use chaos_types::builder;
    use std::time::Duration;

    fn log(events: &[&str]) -> Vec<String> {
        events.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_overlap_pass() {
        let events = log(&[
            "submit:a",
            "withdraw:a",
            "submit:b",
            "withdraw:b",
        ]);
        assert!(assert_no_overlap(&events).passed);
    }

    #[test]
    fn test_no_overlap_fail() {
        let events = log(&["submit:a", "submit:b", "withdraw:a", "withdraw:b"]);
        let result = assert_no_overlap(&events);
        assert!(!result.passed);
        assert!(result
            .failure_details
            .unwrap()
            .contains("b submitted while a was still active"));
    }

    #[test]
    fn test_no_overlap_wrong_withdrawal() {
        let events = log(&["submit:a", "withdraw:b"]);
        assert!(!assert_no_overlap(&events).passed);
    }

    #[tokio::test]
    async fn test_all_withdrawn() {
        let orch = MockOrchestrator::new(vec![]);
        let d = builder::pod_kill("db-0", "db", "chaos").unwrap();

        let handle = orch.submit(&d).await.unwrap();
        let result = assert_all_withdrawn(&orch);
        assert!(!result.passed);
        assert!(result.failure_details.unwrap().contains("db-0-pod-kill"));

        orch.withdraw(&handle).await.unwrap();
        assert!(assert_all_withdrawn(&orch).passed);
    }

    #[test]
    fn test_unique_names() {
        let a = builder::pod_kill("db-0", "db", "chaos").unwrap();
        let b = builder::pod_kill("db-1", "db", "chaos").unwrap();

        assert!(assert_unique_names(&[a.clone(), b]).passed);
        assert!(!assert_unique_names(&[a.clone(), a]).passed);
    }

    #[test]
    fn test_results_consistent() {
        let mut results = Results::default();
        assert!(assert_results_consistent(&results).passed);

        results.stats.insert(
            "process-kill".into(),
            ExperimentStats {
                error_count: 1,
                downtime: Duration::from_millis(50),
            },
        );
        assert!(!assert_results_consistent(&results).passed);

        results.total_errors = 1;
        results.total_downtime = Duration::from_millis(50);
        assert!(assert_results_consistent(&results).passed);
    }
}
