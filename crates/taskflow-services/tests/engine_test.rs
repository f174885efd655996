mod helpers;

use chrono::{DateTime, Utc};
use helpers::{seed_chain, TestCompany};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskflow_core::models::{LockAcquisition, Permission, TaskStatus};
use taskflow_core::{AppError, Config};
use taskflow_db::{InMemoryStore, LockStore};
use taskflow_services::{Engine, NewTask};
use uuid::Uuid;

/// Lock store that records every requested lease length.
struct LeaseRecorder {
    inner: Arc<InMemoryStore>,
    ttls: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl LockStore for LeaseRecorder {
    async fn try_acquire(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
        ttl: Duration,
    ) -> Result<LockAcquisition, AppError> {
        self.ttls.lock().unwrap().push(ttl);
        self.inner
            .try_acquire(company_id, resource_key, owner_id, ttl)
            .await
    }

    async fn release(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
    ) -> Result<bool, AppError> {
        self.inner.release(company_id, resource_key, owner_id).await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        self.inner.sweep_expired(now).await
    }
}

async fn engine(company: &TestCompany, config: &Config, locks: Arc<dyn LockStore>) -> Engine {
    Engine::initialize(
        config,
        company.store.clone(),
        company.store.clone(),
        locks,
        company.audit.clone(),
        company.notifier.clone(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_engine_loads_catalog_from_directory() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;

    let engine = engine(&company, &Config::default(), company.store.clone()).await;
    assert_eq!(engine.catalog.len(), company.roles.len());
    assert!(engine
        .authorization
        .has_permission(chain.manager.id, Permission::TaskCreateDown)
        .await
        .unwrap());
    assert!(!engine
        .authorization
        .has_permission(chain.analyst.id, Permission::TaskCreateDown)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_engine_applies_configured_lock_ttl() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let recorder = Arc::new(LeaseRecorder {
        inner: company.store.clone(),
        ttls: Mutex::new(Vec::new()),
    });
    let config = Config {
        lock_ttl_secs: 7,
        ..Config::default()
    };

    let engine = engine(&company, &config, recorder.clone()).await;
    let task = engine
        .orchestrator
        .create_task(NewTask {
            creator_id: chain.manager.id,
            title: "Fechar balanço".to_string(),
            description: None,
            flow_type: "DESCENDANT".to_string(),
            target_user_id: Some(chain.analyst.id),
            target_department_id: None,
        })
        .await
        .unwrap();
    engine
        .orchestrator
        .move_task(chain.analyst.id, task.id, TaskStatus::InProgress, 1)
        .await
        .unwrap();

    assert_eq!(*recorder.ttls.lock().unwrap(), vec![Duration::from_secs(7)]);
    assert_eq!(company.store.lock_count().await, 0);
}

#[tokio::test]
async fn test_engine_applies_configured_cross_department_default() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let sales = company.add_department("Vendas", Some(&chain.manager)).await;
    let ops = company.add_department("Operações", Some(&chain.ceo)).await;
    let unknown_company = Uuid::new_v4();

    let strict = engine(&company, &Config::default(), company.store.clone()).await;
    assert!(!strict
        .authorization
        .check_department_communication(unknown_company, Some(sales.id), ops.id)
        .await
        .unwrap());

    let config = Config {
        default_allow_cross_dept_comm: true,
        ..Config::default()
    };
    let lenient = engine(&company, &config, company.store.clone()).await;
    assert!(lenient
        .authorization
        .check_department_communication(unknown_company, Some(sales.id), ops.id)
        .await
        .unwrap());
}
