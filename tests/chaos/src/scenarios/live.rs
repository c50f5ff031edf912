//! Runs against a real database and Chaos Mesh.
//!
//! Set `DB_CHAOS_TEST_URL` to a Postgres URL and `DB_CHAOS_TEST_NAMESPACE`
//! to the namespace its pods run in. The Kubernetes API is found the same
//! way the binary finds it.

use super::support::config;
use crate::assertions::assert_results_consistent;
use chaos_core::{Harness, RunOutcome, TracingReporter};
use chaos_kube::{KubeClient, KubeConfig};
use chaos_repo::{PostgresRepo, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
#[ignore = "requires postgres on kubernetes with chaos mesh"]
async fn live_postgres_run() {
    let url = std::env::var("DB_CHAOS_TEST_URL").expect("DB_CHAOS_TEST_URL not set");
    let namespace =
        std::env::var("DB_CHAOS_TEST_NAMESPACE").unwrap_or_else(|_| "default".to_string());

    let repo = PostgresRepo::connect(&url, StoreConfig::default())
        .await
        .unwrap();
    let kube = KubeClient::new(KubeConfig::discover(None, None).unwrap()).unwrap();

    let mut config = config();
    config.reseed = true;
    config.sequencer.target_namespace = namespace;
    config.sequencer.chaos_namespace = "chaos-mesh".into();
    config.sequencer.readiness.timeout = Duration::from_secs(300);

    let harness = Harness::new(
        Arc::new(repo),
        Arc::new(kube),
        config,
        Arc::new(TracingReporter),
    );
    let summary = harness.run(std::future::pending()).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(assert_results_consistent(&summary.results).passed);
}
