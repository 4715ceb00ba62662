use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, LoaderTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::entities::{prelude::*, roles, user_roles, users};

use super::role::replace_role_links;

/// Filters for the paginated user listing. Absent fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub status: Option<StatusFilter>,
}

/// Verified/unverified split on `email_verified_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Active,
    Inactive,
}

/// Column values for a new user row. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub account: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified_at: Option<String>,
}

/// Column values for an update. `avatar: None` keeps the stored path.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub account: String,
    pub email: String,
    pub email_verified_at: Option<String>,
    pub avatar: Option<String>,
    pub updated_at: String,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn filtered_query(filter: &UserFilter) -> sea_orm::Select<Users> {
        let mut query = Users::find().order_by_asc(users::Column::Id);

        if let Some(search) = &filter.search {
            query = query.filter(
                Condition::any()
                    .add(users::Column::Name.contains(search))
                    .add(users::Column::Email.contains(search)),
            );
        }

        match filter.status {
            Some(StatusFilter::Active) => {
                query = query.filter(users::Column::EmailVerifiedAt.is_not_null());
            }
            Some(StatusFilter::Inactive) => {
                query = query.filter(users::Column::EmailVerifiedAt.is_null());
            }
            None => {}
        }

        query
    }

    /// Fetch one page of users (id ascending) with their roles and the total
    /// match count.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<(users::Model, Vec<roles::Model>)>, u64)> {
        let paginator = Self::filtered_query(filter).paginate(&self.conn, per_page);
        let total = paginator.num_items().await.context("Failed to count users")?;

        let page_users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch user page")?;

        let role_lists = page_users
            .load_many_to_many(Roles, UserRoles, &self.conn)
            .await
            .context("Failed to load roles for user page")?;

        Ok((page_users.into_iter().zip(role_lists).collect(), total))
    }

    pub async fn get_with_roles(
        &self,
        id: i32,
    ) -> Result<Option<(users::Model, Vec<roles::Model>)>> {
        let Some(user) = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?
        else {
            return Ok(None);
        };

        let user_roles = user
            .find_related(Roles)
            .order_by_asc(roles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to load roles for user")?;

        Ok(Some((user, user_roles)))
    }

    /// Get user by account name, password hash included (login path).
    pub async fn get_by_account(&self, account: &str) -> Result<Option<users::Model>> {
        Users::find()
            .filter(users::Column::Account.eq(account))
            .one(&self.conn)
            .await
            .context("Failed to query user by account")
    }

    /// Whether `account` is already used by a row other than `exclude_id`.
    pub async fn account_taken(&self, account: &str, exclude_id: Option<i32>) -> Result<bool> {
        let mut query = Users::find().filter(users::Column::Account.eq(account));
        if let Some(id) = exclude_id {
            query = query.filter(users::Column::Id.ne(id));
        }
        let count = query
            .count(&self.conn)
            .await
            .context("Failed to check account uniqueness")?;
        Ok(count > 0)
    }

    /// Whether `email` is already used by a row other than `exclude_id`.
    pub async fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> Result<bool> {
        let mut query = Users::find().filter(users::Column::Email.eq(email));
        if let Some(id) = exclude_id {
            query = query.filter(users::Column::Id.ne(id));
        }
        let count = query
            .count(&self.conn)
            .await
            .context("Failed to check email uniqueness")?;
        Ok(count > 0)
    }

    /// Insert a user and its initial role links in one transaction.
    pub async fn create(
        &self,
        new: NewUser,
        role_ids: &[i32],
        now: &str,
    ) -> Result<users::Model> {
        let txn = self.conn.begin().await?;

        let inserted = Users::insert(users::ActiveModel {
            name: Set(new.name),
            account: Set(new.account),
            email: Set(new.email),
            password_hash: Set(new.password_hash),
            email_verified_at: Set(new.email_verified_at),
            created_at: Set(now.to_string()),
            updated_at: Set(now.to_string()),
            ..Default::default()
        })
        .exec(&txn)
        .await?;

        let user_id = inserted.last_insert_id;

        if !role_ids.is_empty() {
            let links: Vec<user_roles::ActiveModel> = role_ids
                .iter()
                .map(|role_id| user_roles::ActiveModel {
                    user_id: Set(user_id),
                    role_id: Set(*role_id),
                })
                .collect();

            UserRoles::insert_many(links).exec(&txn).await?;
        }

        let model = Users::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))?;

        txn.commit().await?;
        Ok(model)
    }

    /// Apply field changes and, when `role_ids` is given, replace the role
    /// link set. Row and links commit together or not at all.
    pub async fn update(
        &self,
        id: i32,
        changes: UserChanges,
        role_ids: Option<&[i32]>,
    ) -> Result<Option<users::Model>> {
        let txn = self.conn.begin().await?;

        let Some(user) = Users::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        active.name = Set(changes.name);
        active.account = Set(changes.account);
        active.email = Set(changes.email);
        active.email_verified_at = Set(changes.email_verified_at);
        if let Some(avatar) = changes.avatar {
            active.avatar = Set(Some(avatar));
        }
        active.updated_at = Set(changes.updated_at);

        let model = active.update(&txn).await?;

        if let Some(role_ids) = role_ids {
            replace_role_links(&txn, id, role_ids).await?;
        }

        txn.commit().await?;
        Ok(Some(model))
    }

    /// Delete a user row. Role links go with it via FK cascade.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Users::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_all(&self) -> Result<u64> {
        Users::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    pub async fn count_verified(&self) -> Result<u64> {
        Users::find()
            .filter(users::Column::EmailVerifiedAt.is_not_null())
            .count(&self.conn)
            .await
            .context("Failed to count verified users")
    }

    /// Count users created in `[start, end)`. Timestamps are RFC3339 strings
    /// with a fixed UTC offset, so lexicographic comparison is chronological.
    pub async fn count_created_between(&self, start: &str, end: &str) -> Result<u64> {
        Users::find()
            .filter(users::Column::CreatedAt.gte(start))
            .filter(users::Column::CreatedAt.lt(end))
            .count(&self.conn)
            .await
            .context("Failed to count users by creation window")
    }
}
