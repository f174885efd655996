use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Closed catalog of capabilities a role can grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    TaskCreateDown,
    TaskCreateUp,
    TaskCreateSameLevel,
    TaskCreateToDepartment,
    TaskEditOwn,
    TaskEditSubordinates,
    TaskEditAll,
    TaskDeleteOwn,
    TaskDeleteSubordinates,
    TaskDeleteAll,
    BoardViewOwn,
    BoardViewDepartment,
    BoardViewAll,
    BoardMoveOwn,
    BoardMoveDepartment,
    DepartmentManage,
    RoleManage,
    UserManage,
    CrossDepartmentCommunicate,
}

impl Permission {
    pub const ALL: [Permission; 19] = [
        Permission::TaskCreateDown,
        Permission::TaskCreateUp,
        Permission::TaskCreateSameLevel,
        Permission::TaskCreateToDepartment,
        Permission::TaskEditOwn,
        Permission::TaskEditSubordinates,
        Permission::TaskEditAll,
        Permission::TaskDeleteOwn,
        Permission::TaskDeleteSubordinates,
        Permission::TaskDeleteAll,
        Permission::BoardViewOwn,
        Permission::BoardViewDepartment,
        Permission::BoardViewAll,
        Permission::BoardMoveOwn,
        Permission::BoardMoveDepartment,
        Permission::DepartmentManage,
        Permission::RoleManage,
        Permission::UserManage,
        Permission::CrossDepartmentCommunicate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::TaskCreateDown => "TASK_CREATE_DOWN",
            Permission::TaskCreateUp => "TASK_CREATE_UP",
            Permission::TaskCreateSameLevel => "TASK_CREATE_SAME_LEVEL",
            Permission::TaskCreateToDepartment => "TASK_CREATE_TO_DEPARTMENT",
            Permission::TaskEditOwn => "TASK_EDIT_OWN",
            Permission::TaskEditSubordinates => "TASK_EDIT_SUBORDINATES",
            Permission::TaskEditAll => "TASK_EDIT_ALL",
            Permission::TaskDeleteOwn => "TASK_DELETE_OWN",
            Permission::TaskDeleteSubordinates => "TASK_DELETE_SUBORDINATES",
            Permission::TaskDeleteAll => "TASK_DELETE_ALL",
            Permission::BoardViewOwn => "BOARD_VIEW_OWN",
            Permission::BoardViewDepartment => "BOARD_VIEW_DEPARTMENT",
            Permission::BoardViewAll => "BOARD_VIEW_ALL",
            Permission::BoardMoveOwn => "BOARD_MOVE_OWN",
            Permission::BoardMoveDepartment => "BOARD_MOVE_DEPARTMENT",
            Permission::DepartmentManage => "DEPARTMENT_MANAGE",
            Permission::RoleManage => "ROLE_MANAGE",
            Permission::UserManage => "USER_MANAGE",
            Permission::CrossDepartmentCommunicate => "CROSS_DEPARTMENT_COMMUNICATE",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid permission: {}", s))
    }
}

/// Built-in role templates every company starts with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    Admin,
    Director,
    Manager,
    Coordinator,
    Analyst,
    Intern,
}

impl SystemRole {
    /// Descriptive level; never used for authorization decisions.
    pub fn level(&self) -> i32 {
        match self {
            SystemRole::Admin => 0,
            SystemRole::Director => 1,
            SystemRole::Manager => 2,
            SystemRole::Coordinator => 3,
            SystemRole::Analyst => 4,
            SystemRole::Intern => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemRole::Admin => "Administrador",
            SystemRole::Director => "Diretor",
            SystemRole::Manager => "Gerente",
            SystemRole::Coordinator => "Coordenador",
            SystemRole::Analyst => "Analista",
            SystemRole::Intern => "Estagiário",
        }
    }

    pub fn default_permissions(&self) -> Vec<Permission> {
        use Permission::*;
        match self {
            SystemRole::Admin => Permission::ALL.to_vec(),
            SystemRole::Director => vec![
                TaskCreateDown,
                TaskCreateUp,
                TaskCreateSameLevel,
                TaskCreateToDepartment,
                TaskEditOwn,
                TaskEditSubordinates,
                TaskDeleteOwn,
                TaskDeleteSubordinates,
                BoardViewAll,
                BoardMoveOwn,
                BoardMoveDepartment,
                DepartmentManage,
                CrossDepartmentCommunicate,
            ],
            SystemRole::Manager => vec![
                TaskCreateDown,
                TaskCreateUp,
                TaskCreateSameLevel,
                TaskCreateToDepartment,
                TaskEditOwn,
                TaskEditSubordinates,
                TaskDeleteOwn,
                BoardViewDepartment,
                BoardMoveOwn,
                BoardMoveDepartment,
            ],
            SystemRole::Coordinator => vec![
                TaskCreateDown,
                TaskCreateUp,
                TaskCreateSameLevel,
                TaskEditOwn,
                BoardViewDepartment,
                BoardMoveOwn,
                BoardMoveDepartment,
            ],
            SystemRole::Analyst => vec![
                TaskCreateUp,
                TaskCreateSameLevel,
                TaskEditOwn,
                TaskDeleteOwn,
                BoardViewOwn,
                BoardMoveOwn,
            ],
            SystemRole::Intern => vec![TaskCreateUp, BoardViewOwn, BoardMoveOwn],
        }
    }
}

/// Named bundle of permissions. `company_id` is `None` for system roles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub name: String,
    pub level: i32,
    pub permissions: Vec<Permission>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(
        company_id: Option<Uuid>,
        name: impl Into<String>,
        level: i32,
        permissions: Vec<Permission>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            name: name.into(),
            level,
            permissions,
            is_system: false,
            created_at: Utc::now(),
        }
    }

    pub fn from_system(system: SystemRole) -> Self {
        Self {
            is_system: true,
            ..Role::new(
                None,
                system.name(),
                system.level(),
                system.default_permissions(),
            )
        }
    }

    /// Roles are usable by users of their own company; system roles by everyone.
    pub fn is_available_to(&self, company_id: Uuid) -> bool {
        self.company_id.map_or(true, |c| c == company_id)
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Role {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let permissions = row
            .get::<Vec<String>, _>("permissions")
            .iter()
            .map(|raw| raw.parse::<Permission>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| sqlx::Error::Decode(format!("Failed to parse permission: {}", e).into()))?;
        Ok(Role {
            id: row.get("id"),
            company_id: row.get("company_id"),
            name: row.get("name"),
            level: row.get("level"),
            permissions,
            is_system: row.get("is_system"),
            created_at: row.get("created_at"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names_round_trip() {
        for permission in Permission::ALL {
            let parsed: Permission = permission.to_string().parse().unwrap();
            assert_eq!(parsed, permission);
        }
        assert!("TASK_CREATE_SIDEWAYS".parse::<Permission>().is_err());
    }

    #[test]
    fn test_permission_serde_uses_catalog_names() {
        let json = serde_json::to_string(&Permission::TaskCreateDown).unwrap();
        assert_eq!(json, "\"TASK_CREATE_DOWN\"");
    }

    #[test]
    fn test_system_role_defaults() {
        assert_eq!(SystemRole::Admin.default_permissions().len(), Permission::ALL.len());
        assert!(SystemRole::Manager
            .default_permissions()
            .contains(&Permission::TaskCreateDown));
        assert!(!SystemRole::Analyst
            .default_permissions()
            .contains(&Permission::TaskCreateToDepartment));
    }

    #[test]
    fn test_role_availability() {
        let company = Uuid::new_v4();
        let system = Role::from_system(SystemRole::Analyst);
        let custom = Role::new(Some(company), "Auditor", 3, vec![]);
        assert!(system.is_system);
        assert!(system.is_available_to(Uuid::new_v4()));
        assert!(custom.is_available_to(company));
        assert!(!custom.is_available_to(Uuid::new_v4()));
    }
}
