use serde::Serialize;
use std::collections::HashSet;
use taskflow_core::models::{Permission, User};
use uuid::Uuid;

/// Read-only projection of an active user's authority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role_id: Uuid,
    pub department_id: Option<Uuid>,
    pub permissions: HashSet<Permission>,
    pub hierarchy_level: i32,
    pub hierarchy_path: Vec<Uuid>,
}

impl AuthContext {
    pub fn new(user: &User, permissions: HashSet<Permission>) -> Self {
        Self {
            user_id: user.id,
            company_id: user.company_id,
            role_id: user.role_id,
            department_id: user.department_id,
            permissions,
            hierarchy_level: user.hierarchy_level,
            hierarchy_path: user.hierarchy_path.clone(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn can_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.permissions.contains(p))
    }

    /// This user sits strictly above `other` in `other`'s stored path.
    pub fn is_ancestor_of(&self, other: &User) -> bool {
        other.has_ancestor(self.user_id)
    }

    pub fn is_descendant_of(&self, other_id: Uuid) -> bool {
        other_id != self.user_id && self.hierarchy_path.contains(&other_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestry_helpers_use_stored_paths() {
        let company = Uuid::new_v4();
        let role = Uuid::new_v4();
        let boss = User::new(company, role, "Chefe", "chefe@acme.test");
        let mut report = User::new(company, role, "Ana", "ana@acme.test");
        report.superior_id = Some(boss.id);
        report.hierarchy_path = vec![boss.id, report.id];
        report.hierarchy_level = 1;

        let boss_ctx = AuthContext::new(&boss, HashSet::from([Permission::TaskCreateDown]));
        let report_ctx = AuthContext::new(&report, HashSet::new());

        assert!(boss_ctx.is_ancestor_of(&report));
        assert!(!report_ctx.is_ancestor_of(&boss));
        assert!(report_ctx.is_descendant_of(boss.id));
        assert!(!report_ctx.is_descendant_of(report.id));
        assert!(boss_ctx.can(Permission::TaskCreateDown));
        assert!(!boss_ctx.can_any(&[]));
    }
}
