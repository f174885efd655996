//! Service initialization
//!
//! Wires the stores and hooks into the engine services, applying the runtime
//! settings from [`Config`].

use std::sync::Arc;
use taskflow_core::{AppError, AuditSink, Config, NotificationDispatcher};
use taskflow_db::{DirectoryStore, LockStore, TaskStore};

use crate::authorization::AuthorizationService;
use crate::hierarchy::HierarchyService;
use crate::orchestrator::TaskOrchestrator;
use crate::permissions::PermissionCatalog;

/// The initialized engine services, sharing one permission catalog.
#[derive(Clone)]
pub struct Engine {
    pub catalog: Arc<PermissionCatalog>,
    pub hierarchy: Arc<HierarchyService>,
    pub authorization: Arc<AuthorizationService>,
    pub orchestrator: Arc<TaskOrchestrator>,
}

impl Engine {
    /// Load the permission catalog from the directory and build every service.
    #[tracing::instrument(skip_all)]
    pub async fn initialize(
        config: &Config,
        directory: Arc<dyn DirectoryStore>,
        tasks: Arc<dyn TaskStore>,
        locks: Arc<dyn LockStore>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, AppError> {
        let catalog = Arc::new(PermissionCatalog::load(directory.as_ref()).await?);
        if catalog.is_empty() {
            tracing::warn!("Permission catalog is empty, every permission check will deny");
        }

        let hierarchy = Arc::new(HierarchyService::new(directory.clone(), audit.clone()));
        let authorization = Arc::new(AuthorizationService::from_config(
            directory.clone(),
            tasks.clone(),
            catalog.clone(),
            audit,
            config,
        ));
        let orchestrator = Arc::new(TaskOrchestrator::from_config(
            authorization.clone(),
            directory,
            tasks,
            locks,
            notifier,
            config,
        ));

        tracing::info!(
            roles = catalog.len(),
            lock_ttl_secs = config.lock_ttl_secs,
            default_allow_cross_dept_comm = config.default_allow_cross_dept_comm,
            "Engine services initialized"
        );

        Ok(Self {
            catalog,
            hierarchy,
            authorization,
            orchestrator,
        })
    }
}
