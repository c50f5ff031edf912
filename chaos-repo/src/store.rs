//! Account table shared by the Postgres-wire adapters.

use crate::error::{is_serialization_failure, map_error, sqlstate};
use chaos_core::{EntityId, RepoError, TransferReport};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::time::Instant;

const CREATE_TABLE: &str = r#"
    CREATE TABLE account (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        balance DECIMAL NOT NULL
    )
"#;

const SEED_TABLE: &str = r#"
    INSERT INTO account (balance)
    SELECT $2::DECIMAL
    FROM generate_series(1, $1)
"#;

const DROP_TABLE: &str = "DROP TABLE IF EXISTS account";

const SAMPLE_IDS: &str = "SELECT id::TEXT FROM account ORDER BY random() LIMIT $1";

const TRANSFER: &str = r#"
    UPDATE account
    SET balance = CASE
        WHEN id = $1::UUID THEN balance - $3::DECIMAL
        WHEN id = $2::UUID THEN balance + $3::DECIMAL
    END
    WHERE id IN ($1::UUID, $2::UUID)
"#;

/// Connection pool and transfer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Pool size.
    pub max_connections: u32,
    /// Connections are recycled after this long, so a restarted node is
    /// picked up again quickly.
    pub max_lifetime: Duration,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// Deadline for one transfer, retries included.
    pub operation_timeout: Duration,
    /// Attempts made on serialization conflicts.
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 3,
            max_lifetime: Duration::from_secs(15),
            acquire_timeout: Duration::from_secs(3),
            operation_timeout: Duration::from_secs(5),
            max_retries: 5,
        }
    }
}

/// The `account` table: schema, seeding, id sampling and transfers.
#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: PgPool,
    config: StoreConfig,
}

impl AccountStore {
    /// Connect to `url` and check the connection.
    pub async fn connect(url: &str, config: StoreConfig) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .max_lifetime(config.max_lifetime)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await
            .map_err(map_error)?;

        Ok(Self::from_pool(pool, config))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// The underlying pool, for adapter-specific queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create the table and seed `count` rows with `balance`.
    pub async fn create_table(&self, count: usize, balance: f64) -> Result<(), RepoError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;

        let count = i64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("account count {count} too large")))?;
        sqlx::query(SEED_TABLE)
            .bind(count)
            .bind(balance)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;

        tracing::info!("created and seeded {} accounts", count);
        Ok(())
    }

    /// Drop the table. Succeeds when it does not exist.
    pub async fn drop_table(&self) -> Result<(), RepoError> {
        sqlx::query(DROP_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;

        tracing::info!("dropped account table");
        Ok(())
    }

    /// Up to `count` ids in random order.
    pub async fn sample_ids(&self, count: usize) -> Result<Vec<EntityId>, RepoError> {
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        sqlx::query_scalar::<_, String>(SAMPLE_IDS)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_error)
    }

    /// Move `amount` between two accounts in a serializable transaction.
    ///
    /// Serialization conflicts are retried up to `max_retries` attempts.
    /// The whole operation is bounded by `operation_timeout`; hitting it
    /// yields [`RepoError::Cancelled`].
    pub async fn transfer(&self, from: &EntityId, to: &EntityId, amount: f64) -> TransferReport {
        let start = Instant::now();

        let outcome = match tokio::time::timeout(
            self.config.operation_timeout,
            self.transfer_with_retry(from, to, amount),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(RepoError::Cancelled),
        };

        TransferReport {
            elapsed: start.elapsed(),
            outcome,
        }
    }

    async fn transfer_with_retry(
        &self,
        from: &EntityId,
        to: &EntityId,
        amount: f64,
    ) -> Result<(), RepoError> {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.transfer_once(from, to, amount).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if !is_serialization_failure(sqlstate(&err).as_deref()) {
                return Err(map_error(err));
            }
            if attempt >= max_attempts {
                return Err(RepoError::Conflict {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }

            tracing::debug!("transfer conflict, attempt {}/{}", attempt, max_attempts);
            attempt += 1;
        }
    }

    async fn transfer_once(
        &self,
        from: &EntityId,
        to: &EntityId,
        amount: f64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        sqlx::query(TRANSFER)
            .bind(from)
            .bind(to)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }
}
