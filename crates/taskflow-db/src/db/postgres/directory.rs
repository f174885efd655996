use sqlx::{PgPool, Postgres};
use taskflow_core::models::{
    Company, Department, DepartmentCommunication, Role, User, UserStatus,
};
use taskflow_core::AppError;
use uuid::Uuid;

use super::transaction::TransactionGuard;
use crate::db::store::{precondition_failed, DirectoryStore, Precondition, WriteBatch, WriteOp};

const USER_COLUMNS: &str = r#"
    id, company_id, role_id, department_id, superior_id, hierarchy_path,
    hierarchy_level, status, name, email, deactivated_at, deactivated_by,
    deactivation_reason, created_at, updated_at
"#;

const DEPARTMENT_COLUMNS: &str = r#"
    id, company_id, name, leader_id, fallback_leader_id, is_active, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgDirectoryStore {
    pool: PgPool,
}

impl PgDirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_users(&self, filter: &str, bind: Uuid) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY hierarchy_level, created_at, id",
            USER_COLUMNS, filter
        );
        let users = sqlx::query_as::<Postgres, User>(&sql)
            .bind(bind)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, filter = filter, "Failed to list users");
                AppError::Database(e)
            })?;
        Ok(users)
    }
}

#[async_trait::async_trait]
impl DirectoryStore for PgDirectoryStore {
    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "users"))]
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<Postgres, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "users"))]
    async fn list_users_by_superior(&self, superior_id: Uuid) -> Result<Vec<User>, AppError> {
        self.fetch_users("superior_id = $1", superior_id).await
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "users"))]
    async fn list_users_with_path_containing(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<User>, AppError> {
        // Served by the GIN index on hierarchy_path.
        self.fetch_users("$1 = ANY(hierarchy_path) AND id <> $1", user_id)
            .await
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "users"))]
    async fn list_users_by_company(
        &self,
        company_id: Uuid,
        status: Option<UserStatus>,
    ) -> Result<Vec<User>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM users
            WHERE company_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY hierarchy_level, created_at, id
            "#,
            USER_COLUMNS
        );
        let users = sqlx::query_as::<Postgres, User>(&sql)
            .bind(company_id)
            .bind(status.map(|s| s.to_string()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, company_id = %company_id, "Failed to list company users");
                AppError::Database(e)
            })?;
        Ok(users)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "users"))]
    async fn list_users_by_department(&self, department_id: Uuid) -> Result<Vec<User>, AppError> {
        self.fetch_users("department_id = $1", department_id).await
    }

    #[tracing::instrument(skip(self, path), fields(db.system = "postgresql", db.table = "users"))]
    async fn update_hierarchy_path(
        &self,
        user_id: Uuid,
        path: &[Uuid],
        level: i32,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET hierarchy_path = $2, hierarchy_level = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(path)
        .bind(level)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to update hierarchy path");
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "roles"))]
    async fn get_role(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<Postgres, Role>(
            r#"
            SELECT id, company_id, name, level, permissions, is_system, created_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "roles"))]
    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<Postgres, Role>(
            r#"
            SELECT id, company_id, name, level, permissions, is_system, created_at
            FROM roles
            ORDER BY level, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "departments"))]
    async fn get_department(&self, department_id: Uuid) -> Result<Option<Department>, AppError> {
        let sql = format!("SELECT {} FROM departments WHERE id = $1", DEPARTMENT_COLUMNS);
        let department = sqlx::query_as::<Postgres, Department>(&sql)
            .bind(department_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(department)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "departments"))]
    async fn list_departments_led_by(&self, user_id: Uuid) -> Result<Vec<Department>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM departments
            WHERE leader_id = $1 OR fallback_leader_id = $1
            ORDER BY created_at, id
            "#,
            DEPARTMENT_COLUMNS
        );
        let departments = sqlx::query_as::<Postgres, Department>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(departments)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.system = "postgresql", db.table = "department_communications")
    )]
    async fn get_department_communication(
        &self,
        company_id: Uuid,
        from_department_id: Uuid,
        to_department_id: Uuid,
    ) -> Result<Option<DepartmentCommunication>, AppError> {
        let rule = sqlx::query_as::<Postgres, DepartmentCommunication>(
            r#"
            SELECT id, company_id, from_department_id, to_department_id,
                   allowed, requires_approval, created_at
            FROM department_communications
            WHERE company_id = $1 AND from_department_id = $2 AND to_department_id = $3
            "#,
        )
        .bind(company_id)
        .bind(from_department_id)
        .bind(to_department_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rule)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "companies"))]
    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<Postgres, Company>(
            "SELECT id, name, allow_cross_dept_comm, created_at FROM companies WHERE id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = TransactionGuard::begin(&self.pool).await?;

        for precondition in batch.preconditions() {
            let holds = match precondition {
                Precondition::UserStatus { user_id, status } => {
                    let current: Option<UserStatus> = sqlx::query_scalar(
                        "SELECT status FROM users WHERE id = $1 FOR UPDATE",
                    )
                    .bind(user_id)
                    .fetch_optional(tx.connection()?)
                    .await?;
                    current == Some(*status)
                }
                Precondition::SuperiorIs {
                    user_id,
                    superior_id,
                } => {
                    let current: Option<Option<Uuid>> = sqlx::query_scalar(
                        "SELECT superior_id FROM users WHERE id = $1 FOR UPDATE",
                    )
                    .bind(user_id)
                    .fetch_optional(tx.connection()?)
                    .await?;
                    current == Some(*superior_id)
                }
            };

            if !holds {
                tx.rollback().await?;
                tracing::warn!(?precondition, "Write batch precondition failed");
                return Err(precondition_failed(precondition));
            }
        }

        for op in batch.ops() {
            let result = match op {
                WriteOp::SetSuperior {
                    user_id,
                    superior_id,
                } => {
                    sqlx::query(
                        "UPDATE users SET superior_id = $2, updated_at = NOW() WHERE id = $1",
                    )
                    .bind(user_id)
                    .bind(superior_id)
                    .execute(tx.connection()?)
                    .await
                }
                WriteOp::DeactivateUser {
                    user_id,
                    actor_id,
                    reason,
                    at,
                } => {
                    sqlx::query(
                        r#"
                        UPDATE users
                        SET status = 'INACTIVE', deactivated_at = $2, deactivated_by = $3,
                            deactivation_reason = $4, updated_at = $2
                        WHERE id = $1
                        "#,
                    )
                    .bind(user_id)
                    .bind(at)
                    .bind(actor_id)
                    .bind(reason.as_deref())
                    .execute(tx.connection()?)
                    .await
                }
                WriteOp::SetDepartmentLeadership {
                    department_id,
                    leader_id,
                    fallback_leader_id,
                } => {
                    sqlx::query(
                        r#"
                        UPDATE departments
                        SET leader_id = $2, fallback_leader_id = $3, updated_at = NOW()
                        WHERE id = $1
                        "#,
                    )
                    .bind(department_id)
                    .bind(leader_id)
                    .bind(fallback_leader_id)
                    .execute(tx.connection()?)
                    .await
                }
                WriteOp::DeactivateDepartment { department_id } => {
                    sqlx::query(
                        "UPDATE departments SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
                    )
                    .bind(department_id)
                    .execute(tx.connection()?)
                    .await
                }
            };

            let result = result.map_err(|e| {
                tracing::error!(error = %e, ?op, "Failed to apply write batch operation");
                AppError::Database(e)
            })?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(AppError::NotFound(format!(
                    "write batch target missing: {:?}",
                    op
                )));
            }
        }

        tx.commit().await?;
        tracing::debug!(ops = batch.len(), "Write batch committed");
        Ok(())
    }
}
