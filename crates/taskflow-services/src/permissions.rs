//! Role → permission lookup.
//!
//! The catalog is built once (from the directory or by hand in tests) and
//! shared read-only through an `Arc`.

use std::collections::{HashMap, HashSet};
use taskflow_core::models::{Permission, Role};
use taskflow_core::AppError;
use taskflow_db::DirectoryStore;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    roles: HashMap<Uuid, HashSet<Permission>>,
}

impl PermissionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let roles = roles
            .into_iter()
            .map(|role| (role.id, role.permissions.iter().copied().collect()))
            .collect();
        Self { roles }
    }

    /// Snapshot every role currently stored.
    #[tracing::instrument(skip(store))]
    pub async fn load(store: &dyn DirectoryStore) -> Result<Self, AppError> {
        let roles = store.list_roles().await?;
        tracing::info!(roles = roles.len(), "Permission catalog loaded");
        Ok(Self::from_roles(&roles))
    }

    pub fn with_role(
        mut self,
        role_id: Uuid,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        self.roles.insert(role_id, permissions.into_iter().collect());
        self
    }

    /// `None` when the role is unknown to the catalog.
    pub fn permissions(&self, role_id: Uuid) -> Option<&HashSet<Permission>> {
        self.roles.get(&role_id)
    }

    pub fn grants(&self, role_id: Uuid, permission: Permission) -> bool {
        self.roles
            .get(&role_id)
            .is_some_and(|set| set.contains(&permission))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::models::SystemRole;

    #[test]
    fn test_catalog_from_system_roles() {
        let manager = Role::from_system(SystemRole::Manager);
        let intern = Role::from_system(SystemRole::Intern);
        let catalog = PermissionCatalog::from_roles([&manager, &intern]);

        assert!(catalog.grants(manager.id, Permission::TaskCreateDown));
        assert!(!catalog.grants(intern.id, Permission::TaskCreateDown));
        assert!(catalog.grants(intern.id, Permission::TaskCreateUp));
        assert!(!catalog.grants(Uuid::new_v4(), Permission::TaskCreateUp));
    }

    #[test]
    fn test_with_role_replaces_previous_set() {
        let role_id = Uuid::new_v4();
        let catalog = PermissionCatalog::new()
            .with_role(role_id, [Permission::BoardMoveOwn])
            .with_role(role_id, [Permission::BoardViewAll]);

        assert_eq!(catalog.len(), 1);
        assert!(!catalog.grants(role_id, Permission::BoardMoveOwn));
        assert!(catalog.grants(role_id, Permission::BoardViewAll));
    }
}
