use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::time::Instant;

use contacts_store::error::StoreError;
use contacts_store::lock::{DistributedLock, LockGuard};

use crate::config::PostgresConfig;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `PostgreSQL` [`DistributedLock`] over the `{prefix}contact_locks` table.
///
/// A lock is a row keyed by name. Every server instance pointed at the same
/// database serializes on it, and a row whose `expires_at` has passed is taken
/// over by the next acquirer.
pub struct PostgresDistributedLock {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresDistributedLock {
    /// The locks table must already exist; see [`run_migrations`](crate::run_migrations).
    pub fn from_pool(pool: PgPool, config: PostgresConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl DistributedLock for PostgresDistributedLock {
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StoreError> {
        let table = self.config.locks_table();
        let owner = uuid::Uuid::new_v4().to_string();

        // Expiry is computed and compared on the database clock only, so
        // instances with skewed clocks agree on when a lock lapses.
        let query = format!(
            "INSERT INTO {table} (name, owner, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (name) DO UPDATE \
             SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at \
             WHERE {table}.expires_at <= NOW()"
        );

        let result = sqlx::query(&query)
            .bind(name)
            .bind(&owner)
            .bind(ttl.as_secs_f64())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Box::new(PostgresLockGuard {
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
            name: name.to_owned(),
            owner,
        })))
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StoreError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(guard) = self.try_acquire(name, ttl).await? {
                return Ok(guard);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::Timeout(timeout));
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// A held lock row. Release deletes the row only while this guard still owns it.
pub struct PostgresLockGuard {
    pool: PgPool,
    config: Arc<PostgresConfig>,
    name: String,
    owner: String,
}

#[async_trait]
impl LockGuard for PostgresLockGuard {
    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        let table = self.config.locks_table();
        sqlx::query(&format!("DELETE FROM {table} WHERE name = $1 AND owner = $2"))
            .bind(&self.name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, StoreError> {
        let table = self.config.locks_table();
        let held: Option<bool> = sqlx::query_scalar(&format!(
            "SELECT expires_at > NOW() FROM {table} WHERE name = $1 AND owner = $2"
        ))
        .bind(&self.name)
        .bind(&self.owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(held.unwrap_or(false))
    }
}
