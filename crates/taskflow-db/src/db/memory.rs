//! In-process implementation of every store trait.
//!
//! All state sits behind one `RwLock`, so a [`WriteBatch`] is checked and
//! applied under a single write guard.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use taskflow_core::models::{
    Company, Department, DepartmentCommunication, DistributedLock, LockAcquisition, Role, Task,
    User, UserStatus,
};
use taskflow_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{
    lease_duration, precondition_failed, DirectoryStore, LockStore, Precondition, TaskStore,
    WriteBatch, WriteOp,
};

#[derive(Default)]
struct State {
    companies: HashMap<Uuid, Company>,
    roles: HashMap<Uuid, Role>,
    users: HashMap<Uuid, User>,
    departments: HashMap<Uuid, Department>,
    communications: Vec<DepartmentCommunication>,
    tasks: HashMap<Uuid, Task>,
    locks: HashMap<(Uuid, String), DistributedLock>,
}

impl State {
    fn sorted_users(&self, filter: impl Fn(&User) -> bool) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().filter(|u| filter(u)).cloned().collect();
        users.sort_by(|a, b| {
            a.hierarchy_level
                .cmp(&b.hierarchy_level)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        users
    }

    fn precondition_holds(&self, precondition: &Precondition) -> bool {
        match precondition {
            Precondition::UserStatus { user_id, status } => self
                .users
                .get(user_id)
                .is_some_and(|u| u.status == *status),
            Precondition::SuperiorIs {
                user_id,
                superior_id,
            } => self
                .users
                .get(user_id)
                .is_some_and(|u| u.superior_id == *superior_id),
        }
    }
}

/// Store used by tests and by deployments without `DATABASE_URL`.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    fail_next_commit: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_company(&self, company: Company) {
        self.state.write().await.companies.insert(company.id, company);
    }

    pub async fn insert_role(&self, role: Role) {
        self.state.write().await.roles.insert(role.id, role);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn insert_department(&self, department: Department) {
        self.state
            .write()
            .await
            .departments
            .insert(department.id, department);
    }

    /// Insert or replace the rule for the same `(from, to)` pair.
    pub async fn insert_department_communication(&self, rule: DepartmentCommunication) {
        let mut state = self.state.write().await;
        state.communications.retain(|c| {
            !(c.company_id == rule.company_id
                && c.from_department_id == rule.from_department_id
                && c.to_department_id == rule.to_department_id)
        });
        state.communications.push(rule);
    }

    /// Make the next [`DirectoryStore::commit`] fail after its preconditions pass.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub async fn lock_count(&self) -> usize {
        self.state.read().await.locks.len()
    }
}

#[async_trait::async_trait]
impl DirectoryStore for InMemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn list_users_by_superior(&self, superior_id: Uuid) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted_users(|u| u.superior_id == Some(superior_id)))
    }

    async fn list_users_with_path_containing(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted_users(|u| u.id != user_id && u.hierarchy_path.contains(&user_id)))
    }

    async fn list_users_by_company(
        &self,
        company_id: Uuid,
        status: Option<UserStatus>,
    ) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted_users(|u| {
            u.company_id == company_id && status.map_or(true, |s| u.status == s)
        }))
    }

    async fn list_users_by_department(&self, department_id: Uuid) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted_users(|u| u.department_id == Some(department_id)))
    }

    async fn update_hierarchy_path(
        &self,
        user_id: Uuid,
        path: &[Uuid],
        level: i32,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        user.hierarchy_path = path.to_vec();
        user.hierarchy_level = level;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn get_role(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(self.state.read().await.roles.get(&role_id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.level.cmp(&b.level).then(a.name.cmp(&b.name)));
        Ok(roles)
    }

    async fn get_department(&self, department_id: Uuid) -> Result<Option<Department>, AppError> {
        Ok(self.state.read().await.departments.get(&department_id).cloned())
    }

    async fn list_departments_led_by(&self, user_id: Uuid) -> Result<Vec<Department>, AppError> {
        let state = self.state.read().await;
        let mut departments: Vec<Department> = state
            .departments
            .values()
            .filter(|d| d.is_led_by(user_id))
            .cloned()
            .collect();
        departments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(departments)
    }

    async fn get_department_communication(
        &self,
        company_id: Uuid,
        from_department_id: Uuid,
        to_department_id: Uuid,
    ) -> Result<Option<DepartmentCommunication>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .communications
            .iter()
            .find(|c| {
                c.company_id == company_id
                    && c.from_department_id == from_department_id
                    && c.to_department_id == to_department_id
            })
            .cloned())
    }

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        Ok(self.state.read().await.companies.get(&company_id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        let mut state = self.state.write().await;

        if let Some(failed) = batch
            .preconditions()
            .iter()
            .find(|p| !state.precondition_holds(p))
        {
            tracing::warn!(precondition = ?failed, "Write batch precondition failed");
            return Err(precondition_failed(failed));
        }

        // Stage every change on copies so a failing op leaves the state untouched.
        let mut users: HashMap<Uuid, User> = HashMap::new();
        let mut departments: HashMap<Uuid, Department> = HashMap::new();

        for op in batch.ops() {
            match op {
                WriteOp::SetSuperior {
                    user_id,
                    superior_id,
                } => {
                    let user = staged(&mut users, &state.users, *user_id, "user")?;
                    user.superior_id = *superior_id;
                    user.updated_at = Utc::now();
                }
                WriteOp::DeactivateUser {
                    user_id,
                    actor_id,
                    reason,
                    at,
                } => {
                    let user = staged(&mut users, &state.users, *user_id, "user")?;
                    user.status = UserStatus::Inactive;
                    user.deactivated_at = Some(*at);
                    user.deactivated_by = Some(*actor_id);
                    user.deactivation_reason = reason.clone();
                    user.updated_at = *at;
                }
                WriteOp::SetDepartmentLeadership {
                    department_id,
                    leader_id,
                    fallback_leader_id,
                } => {
                    let department = staged(
                        &mut departments,
                        &state.departments,
                        *department_id,
                        "department",
                    )?;
                    department.leader_id = *leader_id;
                    department.fallback_leader_id = *fallback_leader_id;
                    department.updated_at = Utc::now();
                }
                WriteOp::DeactivateDepartment { department_id } => {
                    let department = staged(
                        &mut departments,
                        &state.departments,
                        *department_id,
                        "department",
                    )?;
                    department.is_active = false;
                    department.updated_at = Utc::now();
                }
            }
        }

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Store("injected commit failure".to_string()));
        }

        state.users.extend(users);
        state.departments.extend(departments);
        Ok(())
    }
}

fn staged<'a, T: Clone>(
    staging: &'a mut HashMap<Uuid, T>,
    current: &HashMap<Uuid, T>,
    id: Uuid,
    kind: &str,
) -> Result<&'a mut T, AppError> {
    if !staging.contains_key(&id) {
        let record = current
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, id)))?;
        staging.insert(id, record);
    }
    staging
        .get_mut(&id)
        .ok_or_else(|| AppError::Internal(format!("staged {} {} vanished", kind, id)))
}

#[async_trait::async_trait]
impl TaskStore for InMemoryStore {
    async fn get_task(&self, company_id: Uuid, task_id: Uuid) -> Result<Option<Task>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .get(&task_id)
            .filter(|t| t.company_id == company_id)
            .cloned())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.tasks.contains_key(&task.id) {
            return Err(AppError::InvalidInput(format!("task {} already exists", task.id)));
        }
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task_versioned(
        &self,
        task: &Task,
        expected_version: i64,
    ) -> Result<Task, AppError> {
        let mut state = self.state.write().await;
        let stored = state
            .tasks
            .get_mut(&task.id)
            .filter(|t| t.company_id == task.company_id)
            .ok_or_else(|| AppError::NotFound(format!("task {}", task.id)))?;

        if stored.version != expected_version {
            return Err(AppError::VersionConflict {
                task_id: task.id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        let mut updated = task.clone();
        updated.version = expected_version + 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }
}

#[async_trait::async_trait]
impl LockStore for InMemoryStore {
    async fn try_acquire(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
        ttl: Duration,
    ) -> Result<LockAcquisition, AppError> {
        let now = Utc::now();
        let expires_at = now + lease_duration(ttl)?;
        let mut state = self.state.write().await;
        let key = (company_id, resource_key.to_string());

        if let Some(existing) = state.locks.get(&key) {
            if !existing.is_expired(now) && existing.owner_id != owner_id {
                return Ok(LockAcquisition::HeldBy {
                    owner_id: existing.owner_id,
                    expires_at: existing.expires_at,
                });
            }
        }

        let lock = DistributedLock {
            company_id,
            resource_key: resource_key.to_string(),
            owner_id,
            acquired_at: now,
            expires_at,
        };
        state.locks.insert(key, lock.clone());
        Ok(LockAcquisition::Acquired(lock))
    }

    async fn release(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let key = (company_id, resource_key.to_string());
        match state.locks.get(&key) {
            Some(lock) if lock.owner_id == owner_id => {
                state.locks.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let before = state.locks.len();
        state.locks.retain(|_, lock| !lock.is_expired(now));
        Ok((before - state.locks.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::models::{FlowType, SystemRole, TaskAssignee};

    async fn seeded() -> (InMemoryStore, User, User) {
        let store = InMemoryStore::new();
        let company = Company::new("Acme", false);
        let role = Role::from_system(SystemRole::Manager);
        let boss = User::new(company.id, role.id, "Chefe", "chefe@acme.test");
        let mut report = User::new(company.id, role.id, "Ana", "ana@acme.test");
        report.superior_id = Some(boss.id);
        report.hierarchy_path = vec![boss.id, report.id];
        report.hierarchy_level = 1;
        store.insert_company(company).await;
        store.insert_role(role).await;
        store.insert_user(boss.clone()).await;
        store.insert_user(report.clone()).await;
        (store, boss, report)
    }

    #[tokio::test]
    async fn test_path_query_excludes_self() {
        let (store, boss, report) = seeded().await;
        let below = store.list_users_with_path_containing(boss.id).await.unwrap();
        assert_eq!(below.len(), 1);
        assert_eq!(below[0].id, report.id);
    }

    #[tokio::test]
    async fn test_failed_precondition_writes_nothing() {
        let (store, boss, report) = seeded().await;
        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::SetSuperior {
                user_id: report.id,
                superior_id: None,
            })
            .expect(Precondition::UserStatus {
                user_id: boss.id,
                status: UserStatus::Inactive,
            });

        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification(_)));
        let reloaded = store.get_user(report.id).await.unwrap().unwrap();
        assert_eq!(reloaded.superior_id, Some(boss.id));
    }

    #[tokio::test]
    async fn test_missing_target_aborts_whole_batch() {
        let (store, _boss, report) = seeded().await;
        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::SetSuperior {
                user_id: report.id,
                superior_id: None,
            })
            .push(WriteOp::DeactivateUser {
                user_id: Uuid::new_v4(),
                actor_id: report.id,
                reason: None,
                at: Utc::now(),
            });

        assert!(store.commit(batch).await.is_err());
        let reloaded = store.get_user(report.id).await.unwrap().unwrap();
        assert!(reloaded.superior_id.is_some());
    }

    #[tokio::test]
    async fn test_versioned_update_rejects_stale_writer() {
        let (store, boss, report) = seeded().await;
        let task = Task::new(
            boss.company_id,
            boss.id,
            "Relatório",
            None,
            FlowType::Descendant,
            TaskAssignee::User(report.id),
        );
        store.insert_task(&task).await.unwrap();

        let updated = store.update_task_versioned(&task, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let err = store.update_task_versioned(&task, 1).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let store = InMemoryStore::new();
        let company = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let ttl = Duration::from_secs(30);

        assert!(store
            .try_acquire(company, "task:1", alice, ttl)
            .await
            .unwrap()
            .is_acquired());
        let contended = store.try_acquire(company, "task:1", bob, ttl).await.unwrap();
        assert!(matches!(contended, LockAcquisition::HeldBy { owner_id, .. } if owner_id == alice));

        assert!(!store.release(company, "task:1", bob).await.unwrap());
        assert!(store.release(company, "task:1", alice).await.unwrap());
        assert!(store
            .try_acquire(company, "task:1", bob, ttl)
            .await
            .unwrap()
            .is_acquired());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over_and_swept() {
        let store = InMemoryStore::new();
        let company = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        store
            .try_acquire(company, "task:2", alice, Duration::ZERO)
            .await
            .unwrap();
        assert!(store
            .try_acquire(company, "task:2", bob, Duration::from_secs(30))
            .await
            .unwrap()
            .is_acquired());

        store
            .try_acquire(company, "task:3", alice, Duration::ZERO)
            .await
            .unwrap();
        let swept = store.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(store.lock_count().await, 1);
    }
}
