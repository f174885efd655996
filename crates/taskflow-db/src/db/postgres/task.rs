use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use taskflow_core::models::Task;
use taskflow_core::AppError;
use uuid::Uuid;

use crate::db::store::TaskStore;

const TASK_COLUMNS: &str = r#"
    id, company_id, title, description, assigned_to_user_id, assigned_to_department_id,
    created_by_id, flow_type, status, version, escalation_path, history, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TaskStore for PgTaskStore {
    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "tasks"))]
    async fn get_task(&self, company_id: Uuid, task_id: Uuid) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE company_id = $1 AND id = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(company_id)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    #[tracing::instrument(skip(self, task), fields(task_id = %task.id, db.table = "tasks"))]
    async fn insert_task(&self, task: &Task) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, company_id, title, description, assigned_to_user_id,
                assigned_to_department_id, created_by_id, flow_type, status, version,
                escalation_path, history, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(task.id)
        .bind(task.company_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.assigned_to_user_id)
        .bind(task.assigned_to_department_id)
        .bind(task.created_by_id)
        .bind(task.flow_type)
        .bind(task.status)
        .bind(task.version)
        .bind(&task.escalation_path)
        .bind(Json(&task.history))
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                task_id = %task.id,
                company_id = %task.company_id,
                "Failed to insert task"
            );
            AppError::Database(e)
        })?;

        tracing::info!(task_id = %task.id, flow_type = %task.flow_type, "Task inserted");
        Ok(())
    }

    #[tracing::instrument(skip(self, task), fields(task_id = %task.id, db.table = "tasks"))]
    async fn update_task_versioned(
        &self,
        task: &Task,
        expected_version: i64,
    ) -> Result<Task, AppError> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET title = $3, description = $4, assigned_to_user_id = $5,
                assigned_to_department_id = $6, flow_type = $7, status = $8,
                escalation_path = $9, history = $10, version = version + 1, updated_at = NOW()
            WHERE company_id = $1 AND id = $2 AND version = $11
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        let updated = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task.company_id)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.assigned_to_user_id)
            .bind(task.assigned_to_department_id)
            .bind(task.flow_type)
            .bind(task.status)
            .bind(&task.escalation_path)
            .bind(Json(&task.history))
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(updated) = updated {
            return Ok(updated);
        }

        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM tasks WHERE company_id = $1 AND id = $2")
                .bind(task.company_id)
                .bind(task.id)
                .fetch_optional(&self.pool)
                .await?;

        match actual {
            Some(actual) => {
                tracing::debug!(
                    task_id = %task.id,
                    expected_version,
                    actual,
                    "Task version conflict"
                );
                Err(AppError::VersionConflict {
                    task_id: task.id,
                    expected: expected_version,
                    actual,
                })
            }
            None => Err(AppError::NotFound(format!("task {}", task.id))),
        }
    }
}
