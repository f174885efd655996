use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant record. Only the settings the engine consults are modelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Fallback for department pairs without an explicit communication rule.
    pub allow_cross_dept_comm: bool,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(name: impl Into<String>, allow_cross_dept_comm: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            allow_cross_dept_comm,
            created_at: Utc::now(),
        }
    }
}
