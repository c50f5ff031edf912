//! A repo that fails while a chosen experiment is applied.
//!
//! [`MockRepo`] scripts failures by call number, which ties a scenario to
//! the exact tick timing. [`FlakyRepo`] instead watches the
//! [`MockOrchestrator`] and fails transfers only while an experiment of one
//! kind is held, the way a real database misbehaves under chaos.

use async_trait::async_trait;
use chaos_core::{EntityId, MockOrchestrator, MockRepo, Repo, RepoError, TransferReport};
use chaos_types::ExperimentKind;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Repo that fails transfers while an experiment of `kind` is active.
///
/// Everything else, readiness included, is delegated to the wrapped
/// [`MockRepo`].
#[derive(Debug, Clone)]
pub struct FlakyRepo {
    inner: MockRepo,
    orchestrator: MockOrchestrator,
    kind: ExperimentKind,
    downtime: Duration,
    state: Arc<Mutex<FlakyState>>,
}

#[derive(Debug)]
struct FlakyState {
    budget: Option<u32>,
    injected: u32,
}

impl FlakyRepo {
    /// Fail every transfer made while `kind` is held by `orchestrator`.
    pub fn new(inner: MockRepo, orchestrator: MockOrchestrator, kind: ExperimentKind) -> Self {
        Self {
            inner,
            orchestrator,
            kind,
            downtime: Duration::from_millis(50),
            state: Arc::new(Mutex::new(FlakyState {
                budget: None,
                injected: 0,
            })),
        }
    }

    /// Stop failing after `count` injected failures.
    pub fn with_budget(self, count: u32) -> Self {
        self.state.lock().unwrap().budget = Some(count);
        self
    }

    /// Elapsed time reported by each injected failure (default 50ms).
    pub fn with_downtime(mut self, downtime: Duration) -> Self {
        self.downtime = downtime;
        self
    }

    /// Failures injected so far.
    pub fn injected(&self) -> u32 {
        self.state.lock().unwrap().injected
    }

    /// The wrapped repo.
    pub fn inner(&self) -> &MockRepo {
        &self.inner
    }

    fn kind_is_active(&self) -> bool {
        // At most one experiment is ever held, so it is the latest submission.
        self.orchestrator.active_count() > 0
            && self
                .orchestrator
                .submitted()
                .last()
                .is_some_and(|d| d.experiment == self.kind)
    }

    fn take_failure(&self) -> bool {
        if !self.kind_is_active() {
            return false;
        }

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.budget {
            Some(0) => false,
            Some(ref mut left) => {
                *left -= 1;
                state.injected += 1;
                true
            }
            None => {
                state.injected += 1;
                true
            }
        }
    }
}

#[async_trait]
impl Repo for FlakyRepo {
    async fn init(&self, entity_count: usize, initial_balance: f64) -> Result<(), RepoError> {
        self.inner.init(entity_count, initial_balance).await
    }

    async fn deinit(&self) -> Result<(), RepoError> {
        self.inner.deinit().await
    }

    async fn fetch_ids(&self, count: usize) -> Result<Vec<EntityId>, RepoError> {
        self.inner.fetch_ids(count).await
    }

    async fn perform_transfer(
        &self,
        from: &EntityId,
        to: &EntityId,
        amount: f64,
    ) -> TransferReport {
        if self.take_failure() {
            tracing::debug!("injecting failure under {}", self.kind);
            return TransferReport::failed(
                self.downtime,
                RepoError::Pool("connection reset by peer".into()),
            );
        }
        self.inner.perform_transfer(from, to, amount).await
    }

    async fn is_ready(&self) -> Result<bool, RepoError> {
        self.inner.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_core::Orchestrator;
    use chaos_types::builder;

    #[tokio::test]
    async fn fails_only_while_kind_is_held() {
        let orch = MockOrchestrator::new(vec!["db-0"]);
        let repo = FlakyRepo::new(MockRepo::new(2), orch.clone(), ExperimentKind::ProcessKill);
        let (a, b) = ("account-0".to_string(), "account-1".to_string());

        assert!(repo.perform_transfer(&a, &b, 1.0).await.outcome.is_ok());

        let failure = builder::pod_failure("db-0", "db", "chaos", Duration::from_secs(30)).unwrap();
        let handle = orch.submit(&failure).await.unwrap();
        assert!(repo.perform_transfer(&a, &b, 1.0).await.outcome.is_ok());
        orch.withdraw(&handle).await.unwrap();

        let kill = builder::pod_kill("db-0", "db", "chaos").unwrap();
        let handle = orch.submit(&kill).await.unwrap();
        let report = repo.perform_transfer(&a, &b, 1.0).await;
        assert!(report.outcome.is_err());
        assert_eq!(report.elapsed, Duration::from_millis(50));
        orch.withdraw(&handle).await.unwrap();

        assert!(repo.perform_transfer(&a, &b, 1.0).await.outcome.is_ok());
        assert_eq!(repo.injected(), 1);
    }

    #[tokio::test]
    async fn budget_limits_failures() {
        let orch = MockOrchestrator::new(vec!["db-0"]);
        let repo = FlakyRepo::new(MockRepo::new(2), orch.clone(), ExperimentKind::ProcessKill)
            .with_budget(2);
        let (a, b) = ("account-0".to_string(), "account-1".to_string());

        let kill = builder::pod_kill("db-0", "db", "chaos").unwrap();
        orch.submit(&kill).await.unwrap();

        let failed = {
            let mut failed = 0;
            for _ in 0..5 {
                if repo.perform_transfer(&a, &b, 1.0).await.outcome.is_err() {
                    failed += 1;
                }
            }
            failed
        };

        assert_eq!(failed, 2);
        assert_eq!(repo.injected(), 2);
        // Failed transfers never reach the wrapped repo.
        assert_eq!(repo.inner().transfer_count(), 3);
    }
}
