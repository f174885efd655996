use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organisational unit with a primary and an optional fallback leader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Department {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub leader_id: Option<Uuid>,
    pub fallback_leader_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn new(company_id: Uuid, name: impl Into<String>, leader_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            name: name.into(),
            leader_id,
            fallback_leader_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `user_id` is the leader or the fallback leader.
    pub fn is_led_by(&self, user_id: Uuid) -> bool {
        self.leader_id == Some(user_id) || self.fallback_leader_id == Some(user_id)
    }
}

/// Directed delegation rule between two departments of a company.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DepartmentCommunication {
    pub id: Uuid,
    pub company_id: Uuid,
    pub from_department_id: Uuid,
    pub to_department_id: Uuid,
    pub allowed: bool,
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
}

impl DepartmentCommunication {
    pub fn new(
        company_id: Uuid,
        from_department_id: Uuid,
        to_department_id: Uuid,
        allowed: bool,
        requires_approval: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            from_department_id,
            to_department_id,
            allowed,
            requires_approval,
            created_at: Utc::now(),
        }
    }
}
