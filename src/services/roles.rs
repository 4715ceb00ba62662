//! Role Assignment Service: the many-to-many link between users and named
//! roles, plus the per-role membership report the dashboard consumes.

use crate::db::Store;
use crate::entities::roles;

use super::error::ServiceError;
use super::validation::ValidationErrors;

/// Synthetic bucket name for users holding no role.
pub const NO_ROLE_BUCKET: &str = "no_role";

/// One entry of the membership report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMembership {
    pub name: String,
    pub display_name: String,
    pub count: u64,
}

#[derive(Clone)]
pub struct RoleAssignmentService {
    store: Store,
}

impl RoleAssignmentService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list_roles(&self) -> Result<Vec<roles::Model>, ServiceError> {
        Ok(self.store.list_roles().await?)
    }

    /// Add the named roles to whatever the user already holds.
    pub async fn assign(&self, user_id: i32, names: &[String]) -> Result<(), ServiceError> {
        self.ensure_user_exists(user_id).await?;
        let role_ids = self.resolve_names(names).await?;
        self.store.assign_roles(user_id, &role_ids).await?;
        Ok(())
    }

    /// Replace the user's role set with exactly the named roles. Idempotent;
    /// an empty slice clears every assignment.
    pub async fn sync(&self, user_id: i32, names: &[String]) -> Result<(), ServiceError> {
        self.ensure_user_exists(user_id).await?;
        let role_ids = self.resolve_names(names).await?;
        self.store.sync_roles(user_id, &role_ids).await?;
        Ok(())
    }

    /// Member counts per role, display name falling back to the role name,
    /// with a trailing `no_role` bucket when any user has no assignment.
    pub async fn roles_with_user_counts(&self) -> Result<Vec<RoleMembership>, ServiceError> {
        let mut memberships: Vec<RoleMembership> = self
            .store
            .roles_with_user_counts()
            .await?
            .into_iter()
            .map(|row| RoleMembership {
                display_name: row.display_name.unwrap_or_else(|| row.name.clone()),
                name: row.name,
                count: u64::try_from(row.count).unwrap_or(0),
            })
            .collect();

        let unassigned = self.store.count_users_without_roles().await?;
        if unassigned > 0 {
            memberships.push(RoleMembership {
                name: NO_ROLE_BUCKET.to_string(),
                display_name: "No role".to_string(),
                count: unassigned,
            });
        }

        Ok(memberships)
    }

    async fn ensure_user_exists(&self, user_id: i32) -> Result<(), ServiceError> {
        self.store
            .get_user_with_roles(user_id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(user_id))?;
        Ok(())
    }

    async fn resolve_names(&self, names: &[String]) -> Result<Vec<i32>, ServiceError> {
        let found = self.store.find_roles_by_names(names).await?;

        let mut errors = ValidationErrors::new();
        for name in names {
            if !found.iter().any(|role| &role.name == name) {
                errors.add("roles", format!("The role '{name}' does not exist"));
            }
        }

        if errors.is_empty() {
            Ok(found.into_iter().map(|role| role.id).collect())
        } else {
            Err(ServiceError::validation(errors))
        }
    }
}

/// Capability check over a materialized role set.
#[must_use]
pub fn has_role(roles: &[roles::Model], name: &str) -> bool {
    roles.iter().any(|role| role.name == name)
}

/// Whether any of the given roles grants the named permission.
#[must_use]
pub fn role_set_grants(
    permissions: &[crate::entities::permissions::Model],
    permission: &str,
) -> bool {
    permissions.iter().any(|p| p.name == permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: i32, name: &str) -> roles::Model {
        roles::Model {
            id,
            name: name.to_string(),
            display_name: None,
        }
    }

    #[test]
    fn test_has_role() {
        let set = vec![role(1, "admin"), role(2, "editor")];
        assert!(has_role(&set, "admin"));
        assert!(has_role(&set, "editor"));
        assert!(!has_role(&set, "viewer"));
        assert!(!has_role(&[], "admin"));
    }

    #[test]
    fn test_role_set_grants() {
        let perms = vec![crate::entities::permissions::Model {
            id: 1,
            name: "manage users".to_string(),
        }];
        assert!(role_set_grants(&perms, "manage users"));
        assert!(!role_set_grants(&perms, "manage billing"));
    }
}
