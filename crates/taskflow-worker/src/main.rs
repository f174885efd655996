//! Sweeps expired advisory locks until interrupted.
//!
//! Uses the Postgres store when `DATABASE_URL` is set, otherwise an in-process
//! store.

use std::sync::Arc;
use taskflow_core::Config;
use taskflow_db::{setup_database, InMemoryStore, LockStore, PgLockStore};
use taskflow_services::LockMaintenanceService;

async fn lock_store(config: &Config) -> Result<Arc<dyn LockStore>, anyhow::Error> {
    if config.database_url.is_some() {
        let pool = setup_database(config).await?;
        return Ok(Arc::new(PgLockStore::new(pool)));
    }
    tracing::warn!("DATABASE_URL not set, using the in-memory store");
    Ok(Arc::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    taskflow_infra::init_telemetry(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let locks = lock_store(&config).await?;
    let maintenance = Arc::new(LockMaintenanceService::from_config(locks, &config));

    let sweeper = maintenance.clone().start();
    tracing::info!(
        sweep_interval_secs = config.lock_sweep_interval_secs,
        persistent = config.database_url.is_some(),
        "Taskflow worker started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    sweeper.abort();
    if let Err(e) = maintenance.sweep_expired_locks().await {
        tracing::warn!(error = %e, "Final lock sweep failed");
    }
    taskflow_infra::shutdown_telemetry().await;
    Ok(())
}
