//! Plain PostgreSQL adapter.

use crate::error::map_error;
use crate::store::{AccountStore, StoreConfig};
use async_trait::async_trait;
use chaos_core::{EntityId, Repo, RepoError, TransferReport};

const READY: &str = "SELECT NOT pg_is_in_recovery()";

/// PostgreSQL datastore.
///
/// Ready when the connected server accepts writes, i.e. it is not a standby
/// and not replaying WAL after a restart or failover.
#[derive(Debug, Clone)]
pub struct PostgresRepo {
    store: AccountStore,
}

impl PostgresRepo {
    /// Connect to `url`.
    pub async fn connect(url: &str, config: StoreConfig) -> Result<Self, RepoError> {
        let store = AccountStore::connect(url, config).await?;
        tracing::info!("connected to postgres");
        Ok(Self { store })
    }

    /// Wrap an existing store.
    pub fn new(store: AccountStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repo for PostgresRepo {
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
        sqlx::query_scalar::<_, bool>(READY)
            .fetch_one(self.store.pool())
            .await
            .map_err(map_error)
    }
}
