use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Direction of a task-creation request relative to the creator's position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    Descendant,
    Ascendant,
    SameLevel,
    ToDepartment,
}

impl Display for FlowType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FlowType::Descendant => write!(f, "DESCENDANT"),
            FlowType::Ascendant => write!(f, "ASCENDANT"),
            FlowType::SameLevel => write!(f, "SAME_LEVEL"),
            FlowType::ToDepartment => write!(f, "TO_DEPARTMENT"),
        }
    }
}

impl FromStr for FlowType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DESCENDANT" => Ok(FlowType::Descendant),
            "ASCENDANT" => Ok(FlowType::Ascendant),
            "SAME_LEVEL" => Ok(FlowType::SameLevel),
            "TO_DEPARTMENT" => Ok(FlowType::ToDepartment),
            _ => Err(anyhow::anyhow!("Invalid flow type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Review,
    Done,
}

impl TaskStatus {
    /// Board transitions. `Done` is terminal and a move to the same column is not a transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Todo, InProgress)
                | (Todo, Blocked)
                | (InProgress, Review)
                | (InProgress, Blocked)
                | (InProgress, Todo)
                | (Blocked, Todo)
                | (Blocked, InProgress)
                | (Review, Done)
                | (Review, InProgress)
        )
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Todo => write!(f, "TODO"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Blocked => write!(f, "BLOCKED"),
            TaskStatus::Review => write!(f, "REVIEW"),
            TaskStatus::Done => write!(f, "DONE"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "BLOCKED" => Ok(TaskStatus::Blocked),
            "REVIEW" => Ok(TaskStatus::Review),
            "DONE" => Ok(TaskStatus::Done),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    Created,
    Escalated,
    Moved,
    Reassigned,
}

/// Append-only history record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskHistoryEntry {
    pub action: TaskAction,
    pub actor_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Resolved owner of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAssignee {
    User(Uuid),
    Department(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to_user_id: Option<Uuid>,
    pub assigned_to_department_id: Option<Uuid>,
    pub created_by_id: Uuid,
    pub flow_type: FlowType,
    pub status: TaskStatus,
    /// Optimistic-concurrency counter; every successful write increments it.
    pub version: i64,
    pub escalation_path: Vec<Uuid>,
    pub history: Vec<TaskHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Task {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Task {
            id: row.get("id"),
            company_id: row.get("company_id"),
            title: row.get("title"),
            description: row.get("description"),
            assigned_to_user_id: row.get("assigned_to_user_id"),
            assigned_to_department_id: row.get("assigned_to_department_id"),
            created_by_id: row.get("created_by_id"),
            flow_type: row.get("flow_type"),
            status: row.get("status"),
            version: row.get("version"),
            escalation_path: row.get("escalation_path"),
            history: row
                .get::<sqlx::types::Json<Vec<TaskHistoryEntry>>, _>("history")
                .0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl Task {
    pub fn new(
        company_id: Uuid,
        created_by_id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        flow_type: FlowType,
        assignee: TaskAssignee,
    ) -> Self {
        let now = Utc::now();
        let (assigned_to_user_id, assigned_to_department_id) = match assignee {
            TaskAssignee::User(id) => (Some(id), None),
            TaskAssignee::Department(id) => (None, Some(id)),
        };
        Self {
            id: Uuid::new_v4(),
            company_id,
            title: title.into(),
            description,
            assigned_to_user_id,
            assigned_to_department_id,
            created_by_id,
            flow_type,
            status: TaskStatus::Todo,
            version: 1,
            escalation_path: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The assignment, or `None` when both or neither assignee fields are set.
    pub fn assignee(&self) -> Option<TaskAssignee> {
        match (self.assigned_to_user_id, self.assigned_to_department_id) {
            (Some(user), None) => Some(TaskAssignee::User(user)),
            (None, Some(department)) => Some(TaskAssignee::Department(department)),
            _ => None,
        }
    }

    pub fn assign(&mut self, assignee: TaskAssignee) {
        match assignee {
            TaskAssignee::User(id) => {
                self.assigned_to_user_id = Some(id);
                self.assigned_to_department_id = None;
            }
            TaskAssignee::Department(id) => {
                self.assigned_to_user_id = None;
                self.assigned_to_department_id = Some(id);
            }
        }
    }

    pub fn record(&mut self, action: TaskAction, actor_id: Uuid, details: serde_json::Value) {
        let timestamp = Utc::now();
        self.history.push(TaskHistoryEntry {
            action,
            actor_id,
            timestamp,
            details,
        });
        self.updated_at = timestamp;
    }
}
