//! Persistence seams used by the services.
//!
//! Reads are plain lookups. Every multi-record mutation of the directory goes
//! through [`DirectoryStore::commit`] as a [`WriteBatch`], which either applies
//! completely or not at all.

use chrono::{DateTime, Utc};
use std::time::Duration;
use taskflow_core::models::{
    Company, Department, DepartmentCommunication, LockAcquisition, Role, Task, User, UserStatus,
};
use taskflow_core::AppError;
use uuid::Uuid;

/// Users, roles, departments and companies.
#[async_trait::async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Users whose `superior_id` is `superior_id`, any status.
    async fn list_users_by_superior(&self, superior_id: Uuid) -> Result<Vec<User>, AppError>;

    /// Users whose stored path contains `user_id`, excluding the user itself.
    async fn list_users_with_path_containing(&self, user_id: Uuid)
        -> Result<Vec<User>, AppError>;

    async fn list_users_by_company(
        &self,
        company_id: Uuid,
        status: Option<UserStatus>,
    ) -> Result<Vec<User>, AppError>;

    async fn list_users_by_department(&self, department_id: Uuid) -> Result<Vec<User>, AppError>;

    /// Overwrite the derived path columns of a single user.
    async fn update_hierarchy_path(
        &self,
        user_id: Uuid,
        path: &[Uuid],
        level: i32,
    ) -> Result<(), AppError>;

    async fn get_role(&self, role_id: Uuid) -> Result<Option<Role>, AppError>;

    async fn list_roles(&self) -> Result<Vec<Role>, AppError>;

    async fn get_department(&self, department_id: Uuid) -> Result<Option<Department>, AppError>;

    /// Departments where `user_id` is the leader or the fallback leader.
    async fn list_departments_led_by(&self, user_id: Uuid) -> Result<Vec<Department>, AppError>;

    async fn get_department_communication(
        &self,
        company_id: Uuid,
        from_department_id: Uuid,
        to_department_id: Uuid,
    ) -> Result<Option<DepartmentCommunication>, AppError>;

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError>;

    /// Apply a batch atomically.
    ///
    /// Fails with [`AppError::ConcurrentModification`] when a precondition no
    /// longer holds; nothing is written in that case.
    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError>;
}

#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, company_id: Uuid, task_id: Uuid) -> Result<Option<Task>, AppError>;

    async fn insert_task(&self, task: &Task) -> Result<(), AppError>;

    /// Persist `task` if the stored version still equals `expected_version`.
    ///
    /// Returns the stored task with its version incremented, or
    /// [`AppError::VersionConflict`] carrying the version actually found.
    async fn update_task_versioned(
        &self,
        task: &Task,
        expected_version: i64,
    ) -> Result<Task, AppError>;
}

/// Tenant-scoped leases keyed by `resourceType:resourceId`.
#[async_trait::async_trait]
pub trait LockStore: Send + Sync {
    /// Take the lease when it is free, expired, or already held by `owner_id`.
    async fn try_acquire(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
        ttl: Duration,
    ) -> Result<LockAcquisition, AppError>;

    /// Release a lease held by `owner_id`. Returns false when it was not held.
    async fn release(
        &self,
        company_id: Uuid,
        resource_key: &str,
        owner_id: Uuid,
    ) -> Result<bool, AppError>;

    /// Delete every lease that expired at or before `now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Condition checked inside the batch's transaction before any write.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    UserStatus {
        user_id: Uuid,
        status: UserStatus,
    },
    SuperiorIs {
        user_id: Uuid,
        superior_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    SetSuperior {
        user_id: Uuid,
        superior_id: Option<Uuid>,
    },
    DeactivateUser {
        user_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    SetDepartmentLeadership {
        department_id: Uuid,
        leader_id: Option<Uuid>,
        fallback_leader_id: Option<Uuid>,
    },
    DeactivateDepartment {
        department_id: Uuid,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    preconditions: Vec<Precondition>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&mut self, precondition: Precondition) -> &mut Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Error returned when a precondition is found violated at commit time.
pub(crate) fn precondition_failed(precondition: &Precondition) -> AppError {
    match precondition {
        Precondition::UserStatus { user_id, status } => AppError::ConcurrentModification(
            format!("user {} is no longer {}", user_id, status),
        ),
        Precondition::SuperiorIs { user_id, .. } => AppError::ConcurrentModification(format!(
            "superior of user {} changed concurrently",
            user_id
        )),
    }
}

pub(crate) fn lease_duration(ttl: Duration) -> Result<chrono::Duration, AppError> {
    chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::InvalidInput(format!("Invalid lock TTL: {}", e)))
}
