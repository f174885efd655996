use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use taskflow_core::models::{DistributedLock, LockAcquisition};
use taskflow_core::AppError;
use uuid::Uuid;

use crate::db::store::{lease_duration, LockStore};

#[derive(Clone)]
pub struct PgLockStore {
    pool: PgPool,
}

impl PgLockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_holder(
        &self,
        company_id: Uuid,
        resource_key: &str,
    ) -> Result<Option<DistributedLock>, AppError> {
        let lock = sqlx::query_as::<Postgres, DistributedLock>(
            r#"
            SELECT company_id, resource_key, owner_id, acquired_at, expires_at
            FROM distributed_locks
            WHERE company_id = $1 AND resource_key = $2
            "#,
        )
        .bind(company_id)
        .bind(resource_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lock)
    }
}

#[async_trait::async_trait]
impl LockStore for PgLockStore {
    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "distributed_locks"))]
    async fn try_acquire(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
        ttl: Duration,
    ) -> Result<LockAcquisition, AppError> {
        let now = Utc::now();
        let expires_at = now + lease_duration(ttl)?;

        // A concurrent release between the upsert and the holder lookup is retried once.
        for _ in 0..2 {
            let acquired = sqlx::query_as::<Postgres, DistributedLock>(
                r#"
                INSERT INTO distributed_locks (company_id, resource_key, owner_id, acquired_at, expires_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (company_id, resource_key) DO UPDATE
                SET owner_id = EXCLUDED.owner_id,
                    acquired_at = EXCLUDED.acquired_at,
                    expires_at = EXCLUDED.expires_at
                WHERE distributed_locks.expires_at <= EXCLUDED.acquired_at
                   OR distributed_locks.owner_id = EXCLUDED.owner_id
                RETURNING company_id, resource_key, owner_id, acquired_at, expires_at
                "#,
            )
            .bind(company_id)
            .bind(resource_key)
            .bind(owner_id)
            .bind(now)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, resource_key = resource_key, "Failed to acquire lock");
                AppError::Database(e)
            })?;

            if let Some(lock) = acquired {
                tracing::debug!(resource_key = resource_key, owner_id = %owner_id, "Lock acquired");
                return Ok(LockAcquisition::Acquired(lock));
            }

            if let Some(holder) = self.current_holder(company_id, resource_key).await? {
                return Ok(LockAcquisition::HeldBy {
                    owner_id: holder.owner_id,
                    expires_at: holder.expires_at,
                });
            }
        }

        Err(AppError::ConcurrentModification(format!(
            "lock {} is changing hands too quickly",
            resource_key
        )))
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "distributed_locks"))]
    async fn release(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM distributed_locks
            WHERE company_id = $1 AND resource_key = $2 AND owner_id = $3
            "#,
        )
        .bind(company_id)
        .bind(resource_key)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "distributed_locks"))]
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM distributed_locks WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to sweep expired locks");
                AppError::Database(e)
            })?;

        Ok(result.rows_affected())
    }
}
