//! Postgres-backed stores.

mod directory;
mod lock;
mod task;
pub mod transaction;

pub use directory::PgDirectoryStore;
pub use lock::PgLockStore;
pub use task::PgTaskStore;
pub use transaction::TransactionGuard;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use taskflow_core::Config;

/// Embedded schema migrations for the engine's tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connect to Postgres and apply pending migrations.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the Postgres store")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
