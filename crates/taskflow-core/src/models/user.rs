use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl Display for UserStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserStatus::Active => write!(f, "ACTIVE"),
            UserStatus::Inactive => write!(f, "INACTIVE"),
            UserStatus::Suspended => write!(f, "SUSPENDED"),
        }
    }
}

/// A member of a company's hierarchy.
///
/// `hierarchy_path` runs from the root down to this user (self included) and
/// `hierarchy_level` is its zero-based depth. Both are derived data owned by
/// the hierarchy service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub company_id: Uuid,
    pub role_id: Uuid,
    pub department_id: Option<Uuid>,
    pub superior_id: Option<Uuid>,
    pub hierarchy_path: Vec<Uuid>,
    pub hierarchy_level: i32,
    pub status: UserStatus,
    pub name: String,
    pub email: String,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub deactivated_by: Option<Uuid>,
    pub deactivation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an active user whose path only contains itself.
    pub fn new(
        company_id: Uuid,
        role_id: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            company_id,
            role_id,
            department_id: None,
            superior_id: None,
            hierarchy_path: vec![id],
            hierarchy_level: 0,
            status: UserStatus::Active,
            name: name.into(),
            email: email.into(),
            deactivated_at: None,
            deactivated_by: None,
            deactivation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_root(&self) -> bool {
        self.superior_id.is_none()
    }

    /// True when `other` appears strictly above this user in the stored path.
    pub fn has_ancestor(&self, other: Uuid) -> bool {
        other != self.id && self.hierarchy_path.contains(&other)
    }

    /// Check the stored path against the local invariants (tail, length).
    pub fn path_is_well_formed(&self) -> bool {
        self.hierarchy_path.last() == Some(&self.id)
            && self.hierarchy_path.len() as i32 == self.hierarchy_level + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_a_well_formed_root() {
        let user = User::new(Uuid::new_v4(), Uuid::new_v4(), "Ana", "ana@example.com");
        assert!(user.is_active());
        assert!(user.is_root());
        assert!(user.path_is_well_formed());
        assert!(!user.has_ancestor(user.id));
    }

    #[test]
    fn test_has_ancestor_uses_path_membership() {
        let mut user = User::new(Uuid::new_v4(), Uuid::new_v4(), "Bia", "bia@example.com");
        let boss = Uuid::new_v4();
        user.superior_id = Some(boss);
        user.hierarchy_path = vec![boss, user.id];
        user.hierarchy_level = 1;
        assert!(user.has_ancestor(boss));
        assert!(user.path_is_well_formed());
    }
}
