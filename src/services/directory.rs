//! User Directory Service: search, pagination, and CRUD over the `users`
//! table, with role sync and avatar replacement folded into the same calls.

use chrono::{DateTime, Utc};

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store, UserChanges, UserFilter};
use crate::entities::{permissions, roles, users};

use super::avatar::AvatarStore;
use super::error::ServiceError;
use super::password;
use super::validation::{self, ValidationErrors};

pub const DEFAULT_PAGE_SIZE: u64 = 15;

/// Input for admin user creation.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub account: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
    pub email_verified: bool,
}

/// Input for admin user update. `roles: None` leaves the role set unchanged;
/// `Some(vec![])` clears it. Password is not editable through this path.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: String,
    pub account: String,
    pub email: String,
    pub email_verified: bool,
    pub roles: Option<Vec<String>>,
    pub avatar: Option<Vec<u8>>,
}

/// A user row joined with its materialized role set.
#[derive(Debug, Clone)]
pub struct UserWithRoles {
    pub user: users::Model,
    pub roles: Vec<roles::Model>,
}

/// Detail view: roles plus the permissions they grant.
#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: users::Model,
    pub roles: Vec<roles::Model>,
    pub permissions: Vec<permissions::Model>,
}

/// One page of the directory listing.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<UserWithRoles>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct UserDirectoryService {
    store: Store,
    avatars: AvatarStore,
    security: SecurityConfig,
}

impl UserDirectoryService {
    #[must_use]
    pub const fn new(store: Store, avatars: AvatarStore, security: SecurityConfig) -> Self {
        Self {
            store,
            avatars,
            security,
        }
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        per_page: u64,
    ) -> Result<UserPage, ServiceError> {
        let page = page.max(1);
        let (rows, total) = self.store.list_users(filter, page, per_page).await?;

        Ok(UserPage {
            users: rows
                .into_iter()
                .map(|(user, roles)| UserWithRoles { user, roles })
                .collect(),
            total,
            page,
            per_page,
        })
    }

    pub async fn get(&self, id: i32) -> Result<UserDetail, ServiceError> {
        let (user, user_roles) = self
            .store
            .get_user_with_roles(id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(id))?;

        let role_ids: Vec<i32> = user_roles.iter().map(|role| role.id).collect();
        let permissions = self.store.permissions_for_roles(&role_ids).await?;

        Ok(UserDetail {
            user,
            roles: user_roles,
            permissions,
        })
    }

    pub async fn create(
        &self,
        input: CreateUser,
        now: DateTime<Utc>,
    ) -> Result<UserDetail, ServiceError> {
        let mut errors = ValidationErrors::new();

        validation::check_required_text(&mut errors, "name", &input.name);
        validation::check_required_text(&mut errors, "account", &input.account);
        validation::check_required_text(&mut errors, "email", &input.email);
        validation::check_password(&mut errors, &input.password);

        if !input.email.is_empty() && !validation::is_valid_email(&input.email) {
            errors.add("email", "The email must be a valid email address");
        }
        if self.store.account_taken(&input.account, None).await? {
            errors.add("account", "The account has already been taken");
        }
        if self.store.email_taken(&input.email, None).await? {
            errors.add("email", "The email has already been taken");
        }

        let role_ids = self.resolve_role_names(&input.roles, &mut errors).await?;

        if !errors.is_empty() {
            return Err(ServiceError::validation(errors));
        }

        let password_hash = password::hash_password(&input.password, &self.security).await?;
        let now_str = now.to_rfc3339();

        let new = NewUser {
            name: input.name,
            account: input.account,
            email: input.email,
            password_hash,
            email_verified_at: input.email_verified.then(|| now_str.clone()),
        };

        let user = self.store.create_user(new, &role_ids, &now_str).await?;
        tracing::info!(user_id = user.id, account = %user.account, "User created");

        self.get(user.id).await
    }

    pub async fn update(
        &self,
        id: i32,
        input: UpdateUser,
        now: DateTime<Utc>,
    ) -> Result<UserDetail, ServiceError> {
        let (existing, _) = self
            .store
            .get_user_with_roles(id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(id))?;

        let mut errors = ValidationErrors::new();

        validation::check_required_text(&mut errors, "name", &input.name);
        validation::check_required_text(&mut errors, "account", &input.account);
        validation::check_required_text(&mut errors, "email", &input.email);

        if !input.email.is_empty() && !validation::is_valid_email(&input.email) {
            errors.add("email", "The email must be a valid email address");
        }
        if self.store.account_taken(&input.account, Some(id)).await? {
            errors.add("account", "The account has already been taken");
        }
        if self.store.email_taken(&input.email, Some(id)).await? {
            errors.add("email", "The email has already been taken");
        }

        let role_ids = match &input.roles {
            Some(names) => Some(self.resolve_role_names(names, &mut errors).await?),
            None => None,
        };

        let avatar_format = match &input.avatar {
            Some(bytes) => match AvatarStore::validate(bytes) {
                Ok(format) => Some(format),
                Err(rejection) => {
                    errors.add("avatar", rejection.message());
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(ServiceError::validation(errors));
        }

        // Write the replacement blob before touching the row; the old file is
        // only removed once the row points at the new one.
        let new_avatar = match (&input.avatar, avatar_format) {
            (Some(bytes), Some(format)) => Some(
                self.avatars
                    .save(bytes, format)
                    .await
                    .map_err(|e| ServiceError::Storage(format!("{e:#}")))?,
            ),
            _ => None,
        };

        let changes = UserChanges {
            name: input.name,
            account: input.account,
            email: input.email,
            email_verified_at: input.email_verified.then(|| now.to_rfc3339()),
            avatar: new_avatar.clone(),
            updated_at: now.to_rfc3339(),
        };

        let updated = self
            .store
            .update_user(id, changes, role_ids.as_deref())
            .await;

        match updated {
            Ok(Some(user)) => {
                if new_avatar.is_some()
                    && let Some(old) = &existing.avatar
                    && let Err(e) = self.avatars.delete(old).await
                {
                    tracing::warn!(path = %old, "Failed to delete replaced avatar: {e:#}");
                }
                tracing::info!(user_id = user.id, account = %user.account, "User updated");
                self.get(user.id).await
            }
            Ok(None) => {
                self.discard_orphan_blob(new_avatar.as_deref()).await;
                Err(ServiceError::user_not_found(id))
            }
            Err(e) => {
                self.discard_orphan_blob(new_avatar.as_deref()).await;
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let (user, _) = self
            .store
            .get_user_with_roles(id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(id))?;

        if !self.store.delete_user(id).await? {
            return Err(ServiceError::user_not_found(id));
        }

        if let Some(avatar) = &user.avatar
            && let Err(e) = self.avatars.delete(avatar).await
        {
            tracing::warn!(path = %avatar, "Failed to delete avatar of removed user: {e:#}");
        }

        tracing::info!(user_id = id, account = %user.account, "User deleted");
        Ok(())
    }

    /// Map role names to ids, recording a field error for any unknown name.
    async fn resolve_role_names(
        &self,
        names: &[String],
        errors: &mut ValidationErrors,
    ) -> Result<Vec<i32>, ServiceError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.store.find_roles_by_names(names).await?;

        for name in names {
            if !found.iter().any(|role| &role.name == name) {
                errors.add("roles", format!("The role '{name}' does not exist"));
            }
        }

        Ok(found.into_iter().map(|role| role.id).collect())
    }

    /// A blob written for an update that did not commit must not outlive it.
    async fn discard_orphan_blob(&self, path: Option<&str>) {
        if let Some(path) = path
            && let Err(e) = self.avatars.delete(path).await
        {
            tracing::warn!(path = %path, "Failed to clean up unused avatar: {e:#}");
        }
    }
}
