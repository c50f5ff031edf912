//! CockroachDB adapter.

use crate::error::map_error;
use crate::store::{AccountStore, StoreConfig};
use async_trait::async_trait;
use chaos_core::{EntityId, Repo, RepoError, TransferReport};

/// Replication factor a healthy range is expected to have.
pub const DEFAULT_MIN_REPLICAS: u32 = 3;

const UNDER_REPLICATED_RANGES: &str = r#"
    SELECT count(*)
    FROM crdb_internal.ranges
    WHERE array_length(replicas, 1) < $1
"#;

/// CockroachDB datastore.
///
/// Ready when no range has fewer than `min_replicas` replicas, i.e. the
/// cluster has finished up-replicating after losing a node.
#[derive(Debug, Clone)]
pub struct CockroachRepo {
    store: AccountStore,
    min_replicas: u32,
}

impl CockroachRepo {
    /// Connect to `url`.
    pub async fn connect(
        url: &str,
        config: StoreConfig,
        min_replicas: u32,
    ) -> Result<Self, RepoError> {
        let store = AccountStore::connect(url, config).await?;
        tracing::info!("connected to cockroachdb (min replicas {})", min_replicas);
        Ok(Self::new(store, min_replicas))
    }

    /// Wrap an existing store.
    pub fn new(store: AccountStore, min_replicas: u32) -> Self {
        Self {
            store,
            min_replicas,
        }
    }

    /// Replica count below which a range counts as under-replicated.
    pub fn min_replicas(&self) -> u32 {
        self.min_replicas
    }
}

#[async_trait]
impl Repo for CockroachRepo {
    async fn init(&self, entity_count: usize, initial_balance: f64) -> Result<(), RepoError> {
        self.store.create_table(entity_count, initial_balance).await
    }

    async fn deinit(&self) -> Result<(), RepoError> {
        self.store.drop_table().await
    }

    async fn fetch_ids(&self, count: usize) -> Result<Vec<EntityId>, RepoError> {
        self.store.sample_ids(count).await
    }

    async fn perform_transfer(
        &self,
        from: &EntityId,
        to: &EntityId,
        amount: f64,
    ) -> TransferReport {
        self.store.transfer(from, to, amount).await
    }

    async fn is_ready(&self) -> Result<bool, RepoError> {
        let under_replicated: i64 = sqlx::query_scalar(UNDER_REPLICATED_RANGES)
            .bind(i64::from(self.min_replicas))
            .fetch_one(self.store.pool())
            .await
            .map_err(map_error)?;

        if under_replicated > 0 {
            tracing::debug!("{} ranges under-replicated", under_replicated);
        }
        Ok(under_replicated == 0)
    }
}
