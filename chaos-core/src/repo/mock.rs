//! Mock repo for testing.
//!
//! Allows scripting transfer failures and readiness answers, and records
//! every call for verification.

use super::{EntityId, Repo, RepoError, TransferReport};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock repo for testing.
///
/// Transfers succeed unless a failure was scripted for that call number
/// (1-based). Readiness answers are popped from a queue; once the queue is
/// empty every poll reports `default_ready`.
#[derive(Debug, Default)]
pub struct MockRepo {
    inner: Arc<Mutex<MockRepoInner>>,
}

#[derive(Debug, Default)]
struct MockRepoInner {
    ids: Vec<EntityId>,
    fail_fetch: Option<String>,
    transfer_latency: Duration,
    scripted_transfers: HashMap<usize, TransferReport>,
    transfers: Vec<(EntityId, EntityId, f64)>,
    ready_queue: VecDeque<Result<bool, RepoError>>,
    default_ready: bool,
    ready_polls: usize,
    init_calls: Vec<(usize, f64)>,
    deinit_calls: usize,
}

impl MockRepo {
    /// Create a mock holding `entity_count` entities that is always ready.
    pub fn new(entity_count: usize) -> Self {
        let repo = Self::default();
        {
            let mut inner = repo.inner.lock().unwrap();
            inner.ids = (0..entity_count).map(|i| format!("account-{i}")).collect();
            inner.default_ready = true;
        }
        repo
    }

    /// Elapsed time reported for successful transfers.
    pub fn set_transfer_latency(&self, latency: Duration) {
        self.inner.lock().unwrap().transfer_latency = latency;
    }

    /// Make the `call`-th transfer (1-based) fail after `elapsed`.
    pub fn fail_transfer(&self, call: usize, elapsed: Duration, error: RepoError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .scripted_transfers
            .insert(call, TransferReport::failed(elapsed, error));
    }

    /// Cause `fetch_ids()` to fail with the given error.
    pub fn fail_fetch(&self, error: &str) {
        self.inner.lock().unwrap().fail_fetch = Some(error.to_string());
    }

    /// Queue an answer for the next readiness poll.
    pub fn queue_ready(&self, answer: Result<bool, RepoError>) {
        self.inner.lock().unwrap().ready_queue.push_back(answer);
    }

    /// Answer given once the readiness queue is drained.
    pub fn set_default_ready(&self, ready: bool) {
        self.inner.lock().unwrap().default_ready = ready;
    }

    /// Number of readiness polls so far.
    pub fn ready_polls(&self) -> usize {
        self.inner.lock().unwrap().ready_polls
    }

    /// Number of transfers attempted so far.
    pub fn transfer_count(&self) -> usize {
        self.inner.lock().unwrap().transfers.len()
    }

    /// Every transfer attempted so far.
    pub fn transfers(&self) -> Vec<(EntityId, EntityId, f64)> {
        self.inner.lock().unwrap().transfers.clone()
    }

    /// Arguments of every `init()` call.
    pub fn init_calls(&self) -> Vec<(usize, f64)> {
        self.inner.lock().unwrap().init_calls.clone()
    }

    /// Number of `deinit()` calls.
    pub fn deinit_calls(&self) -> usize {
        self.inner.lock().unwrap().deinit_calls
    }
}

impl Clone for MockRepo {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Repo for MockRepo {
    async fn init(&self, entity_count: usize, initial_balance: f64) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.init_calls.push((entity_count, initial_balance));
        inner.ids = (0..entity_count).map(|i| format!("account-{i}")).collect();
        Ok(())
    }

    async fn deinit(&self) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.deinit_calls += 1;
        inner.ids.clear();
        Ok(())
    }

    async fn fetch_ids(&self, count: usize) -> Result<Vec<EntityId>, RepoError> {
        let inner = self.inner.lock().unwrap();

        if let Some(error) = &inner.fail_fetch {
            return Err(RepoError::Database(error.clone()));
        }

        Ok(inner.ids.iter().take(count).cloned().collect())
    }

    async fn perform_transfer(
        &self,
        from: &EntityId,
        to: &EntityId,
        amount: f64,
    ) -> TransferReport {
        let mut inner = self.inner.lock().unwrap();
        inner.transfers.push((from.clone(), to.clone(), amount));
        let call = inner.transfers.len();

        match inner.scripted_transfers.remove(&call) {
            Some(report) => report,
            None => TransferReport::ok(inner.transfer_latency),
        }
    }

    async fn is_ready(&self) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.ready_polls += 1;

        match inner.ready_queue.pop_front() {
            Some(answer) => answer,
            None => Ok(inner.default_ready),
        }
    }
}
