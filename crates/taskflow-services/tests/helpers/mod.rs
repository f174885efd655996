//! Test helpers: an in-memory company wired to every service.
//!
//! Run from workspace root: `cargo test -p taskflow-services`.

#![allow(dead_code)]

pub mod recorders;

use std::collections::HashMap;
use std::sync::Arc;
use taskflow_core::models::{Company, Department, Role, SystemRole, User};
use taskflow_db::InMemoryStore;
use taskflow_services::{
    AuthorizationService, HierarchyService, PermissionCatalog, TaskOrchestrator,
};
use uuid::Uuid;

use recorders::{RecordingAuditSink, RecordingNotifier};

/// A company seeded with the system roles, backed by one [`InMemoryStore`].
pub struct TestCompany {
    pub store: Arc<InMemoryStore>,
    pub company: Company,
    pub roles: HashMap<SystemRole, Role>,
    pub catalog: Arc<PermissionCatalog>,
    pub audit: Arc<RecordingAuditSink>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestCompany {
    pub async fn new() -> Self {
        Self::with_cross_department(false).await
    }

    pub async fn with_cross_department(allow_cross_dept_comm: bool) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let company = Company::new("Acme", allow_cross_dept_comm);
        store.insert_company(company.clone()).await;

        let mut roles = HashMap::new();
        for system in [
            SystemRole::Admin,
            SystemRole::Director,
            SystemRole::Manager,
            SystemRole::Coordinator,
            SystemRole::Analyst,
            SystemRole::Intern,
        ] {
            let role = Role::from_system(system);
            store.insert_role(role.clone()).await;
            roles.insert(system, role);
        }
        let catalog = Arc::new(PermissionCatalog::from_roles(roles.values()));

        Self {
            store,
            company,
            roles,
            catalog,
            audit: Arc::new(RecordingAuditSink::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn role(&self, system: SystemRole) -> Uuid {
        self.roles[&system].id
    }

    /// Seed a user with a consistent path under `superior`.
    pub async fn add_user(&self, name: &str, system: SystemRole, superior: Option<&User>) -> User {
        let mut user = User::new(
            self.company.id,
            self.role(system),
            name,
            format!("{}@acme.test", name.to_lowercase()),
        );
        if let Some(superior) = superior {
            user.superior_id = Some(superior.id);
            user.hierarchy_path = superior.hierarchy_path.clone();
            user.hierarchy_path.push(user.id);
            user.hierarchy_level = superior.hierarchy_level + 1;
            user.department_id = superior.department_id;
        }
        self.store.insert_user(user.clone()).await;
        user
    }

    /// Store a user exactly as given, without touching its path.
    pub async fn put_user(&self, user: &User) {
        self.store.insert_user(user.clone()).await;
    }

    pub async fn add_department(&self, name: &str, leader: Option<&User>) -> Department {
        let department = Department::new(self.company.id, name, leader.map(|l| l.id));
        self.store.insert_department(department.clone()).await;
        department
    }

    pub async fn join_department(&self, user: &mut User, department: &Department) {
        user.department_id = Some(department.id);
        self.store.insert_user(user.clone()).await;
    }

    pub fn hierarchy(&self) -> HierarchyService {
        HierarchyService::new(self.store.clone(), self.audit.clone())
    }

    pub fn authorization(&self) -> Arc<AuthorizationService> {
        Arc::new(AuthorizationService::new(
            self.store.clone(),
            self.store.clone(),
            self.catalog.clone(),
            self.audit.clone(),
        ))
    }

    pub fn orchestrator(&self) -> TaskOrchestrator {
        TaskOrchestrator::new(
            self.authorization(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
        )
    }

    pub async fn user(&self, user_id: Uuid) -> User {
        use taskflow_db::DirectoryStore;
        self.store
            .get_user(user_id)
            .await
            .expect("store read")
            .expect("user exists")
    }

    pub async fn department(&self, department_id: Uuid) -> Department {
        use taskflow_db::DirectoryStore;
        self.store
            .get_department(department_id)
            .await
            .expect("store read")
            .expect("department exists")
    }
}

/// CEO → Manager → Analyst, the smallest chain exercising every flow.
pub struct Chain {
    pub ceo: User,
    pub manager: User,
    pub analyst: User,
}

pub async fn seed_chain(company: &TestCompany) -> Chain {
    let ceo = company.add_user("Carla", SystemRole::Director, None).await;
    let manager = company
        .add_user("Marcos", SystemRole::Manager, Some(&ceo))
        .await;
    let analyst = company
        .add_user("Ana", SystemRole::Analyst, Some(&manager))
        .await;
    Chain {
        ceo,
        manager,
        analyst,
    }
}
