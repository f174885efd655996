use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use taskflow_core::{AppError, Config};
use taskflow_db::LockStore;
use tokio::time::interval;

/// Periodically deletes advisory locks whose lease has run out.
#[derive(Clone)]
pub struct LockMaintenanceService {
    locks: Arc<dyn LockStore>,
    sweep_interval: Duration,
}

impl LockMaintenanceService {
    pub fn new(locks: Arc<dyn LockStore>, sweep_interval: Duration) -> Self {
        Self {
            locks,
            sweep_interval,
        }
    }

    pub fn from_config(locks: Arc<dyn LockStore>, config: &Config) -> Self {
        Self::new(locks, config.lock_sweep_interval())
    }

    /// Start the background sweep.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.sweep_interval);

            loop {
                sweep_interval.tick().await;

                tracing::debug!("Starting scheduled sweep of expired locks");

                if let Err(e) = self.sweep_expired_locks().await {
                    tracing::error!(error = %e, "Lock sweep failed");
                }
            }
        })
    }

    /// Run a single sweep and return how many locks were removed.
    #[tracing::instrument(skip(self), fields(maintenance.operation = "sweep_locks"))]
    pub async fn sweep_expired_locks(&self) -> Result<u64, AppError> {
        let removed = self.locks.sweep_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Expired locks swept");
        } else {
            tracing::debug!("No expired locks to sweep");
        }
        Ok(removed)
    }
}
