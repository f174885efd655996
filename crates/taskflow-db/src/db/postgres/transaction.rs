//! Transaction guard for multi-statement directory writes.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use taskflow_core::AppError;

/// Owns a Postgres transaction until it is explicitly committed or rolled back.
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool).await?;
/// sqlx::query("UPDATE users SET ...").execute(tx.connection()?).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &'a PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin database transaction");
            AppError::Database(e)
        })?;

        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Connection bound to the open transaction.
    pub fn connection(&mut self) -> Result<&mut PgConnection, AppError> {
        self.transaction
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction was already finished".to_string()))
    }

    pub async fn commit(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit database transaction");
                AppError::Database(e)
            })?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to rollback database transaction");
                AppError::Database(e)
            })?;
        }
        Ok(())
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        // sqlx rolls the transaction back when it is dropped unfinished.
        if self.transaction.is_some() {
            tracing::warn!("Transaction dropped without explicit commit or rollback");
        }
    }
}
