//! Mock orchestrator for testing.
//!
//! Keeps submitted experiments in memory and records every submit and
//! withdraw, in order, for verification.

use super::{ExperimentHandle, Orchestrator, OrchestratorError};
use async_trait::async_trait;
use chaos_types::ExperimentDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock orchestrator for testing.
#[derive(Debug, Default)]
pub struct MockOrchestrator {
    inner: Arc<Mutex<MockOrchestratorInner>>,
}

#[derive(Debug, Default)]
struct MockOrchestratorInner {
    instances: Vec<String>,
    fail_list: Option<String>,
    fail_submit_at: Option<(usize, String)>,
    failing_withdrawals: u32,
    submitted: Vec<ExperimentDescriptor>,
    active: HashMap<String, ExperimentHandle>,
    withdrawn: Vec<String>,
    withdraw_attempts: usize,
    events: Vec<String>,
}

impl MockOrchestrator {
    /// Create a mock whose target namespace holds `instances`.
    ///
    /// Instances are returned in the given order, unsorted.
    pub fn new(instances: Vec<&str>) -> Self {
        let orch = Self::default();
        orch.inner.lock().unwrap().instances = instances.into_iter().map(String::from).collect();
        orch
    }

    /// Cause `list_service_instances()` to fail with the given error.
    pub fn fail_list(&self, error: &str) {
        self.inner.lock().unwrap().fail_list = Some(error.to_string());
    }

    /// Cause the `call`-th submission (1-based) to fail.
    pub fn fail_submit_at(&self, call: usize, error: &str) {
        self.inner.lock().unwrap().fail_submit_at = Some((call, error.to_string()));
    }

    /// Cause the next `count` withdrawals to fail.
    pub fn fail_withdrawals(&self, count: u32) {
        self.inner.lock().unwrap().failing_withdrawals = count;
    }

    /// Every descriptor submitted so far, in order.
    pub fn submitted(&self) -> Vec<ExperimentDescriptor> {
        self.inner.lock().unwrap().submitted.clone()
    }

    /// Names withdrawn so far, in order.
    pub fn withdrawn(&self) -> Vec<String> {
        self.inner.lock().unwrap().withdrawn.clone()
    }

    /// Number of experiments currently held.
    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().active.len()
    }

    /// Number of withdraw calls, successful or not.
    pub fn withdraw_attempts(&self) -> usize {
        self.inner.lock().unwrap().withdraw_attempts
    }

    /// `submit:<name>` / `withdraw:<name>` log in call order.
    pub fn events(&self) -> Vec<String> {
        self.inner.lock().unwrap().events.clone()
    }
}

impl Clone for MockOrchestrator {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn list_service_instances(
        &self,
        namespace: &str,
    ) -> Result<Vec<String>, OrchestratorError> {
        let inner = self.inner.lock().unwrap();

        if let Some(error) = &inner.fail_list {
            return Err(OrchestratorError::Discovery {
                namespace: namespace.to_string(),
                reason: error.clone(),
            });
        }

        Ok(inner.instances.clone())
    }

    async fn submit(
        &self,
        descriptor: &ExperimentDescriptor,
    ) -> Result<ExperimentHandle, OrchestratorError> {
        let mut inner = self.inner.lock().unwrap();
        let name = descriptor.name().to_string();

        let call = inner.submitted.len() + 1;
        if let Some((at, error)) = inner.fail_submit_at.clone() {
            if at == call {
                inner.fail_submit_at = None;
                return Err(OrchestratorError::Submit { name, reason: error });
            }
        }

        if inner.active.contains_key(&name) {
            return Err(OrchestratorError::AlreadyExists(name));
        }

        let handle = ExperimentHandle::for_descriptor(descriptor);
        inner.submitted.push(descriptor.clone());
        inner.active.insert(name.clone(), handle.clone());
        inner.events.push(format!("submit:{name}"));
        Ok(handle)
    }

    async fn withdraw(&self, handle: &ExperimentHandle) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().unwrap();
        inner.withdraw_attempts += 1;

        if inner.failing_withdrawals > 0 {
            inner.failing_withdrawals -= 1;
            return Err(OrchestratorError::Withdraw {
                name: handle.name.clone(),
                reason: "injected failure".into(),
            });
        }

        inner.active.remove(&handle.name);
        inner.withdrawn.push(handle.name.clone());
        inner.events.push(format!("withdraw:{}", handle.name));
        Ok(())
    }
}
