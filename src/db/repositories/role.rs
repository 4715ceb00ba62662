use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use std::collections::HashSet;

use crate::entities::{permissions, prelude::*, roles, user_roles};

/// One row of the per-role membership report.
#[derive(Debug, Clone, FromQueryResult)]
pub struct RoleCount {
    pub name: String,
    pub display_name: Option<String>,
    pub count: i64,
}

pub struct RoleRepository {
    conn: DatabaseConnection,
}

impl RoleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_all(&self) -> Result<Vec<roles::Model>> {
        Roles::find()
            .order_by_asc(roles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list roles")
    }

    pub async fn find_by_names(&self, names: &[String]) -> Result<Vec<roles::Model>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        Roles::find()
            .filter(roles::Column::Name.is_in(names.iter().cloned()))
            .all(&self.conn)
            .await
            .context("Failed to look up roles by name")
    }

    /// Union of permissions granted through any of the given roles.
    pub async fn permissions_for_roles(&self, role_ids: &[i32]) -> Result<Vec<permissions::Model>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        Permissions::find()
            .join_rev(
                JoinType::InnerJoin,
                crate::entities::role_permissions::Relation::Permission.def(),
            )
            .filter(
                crate::entities::role_permissions::Column::RoleId.is_in(role_ids.iter().copied()),
            )
            .distinct()
            .order_by_asc(permissions::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to load permissions for roles")
    }

    /// Add links for the given roles, keeping whatever is already assigned.
    pub async fn assign(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
        let existing: HashSet<i32> = UserRoles::find()
            .filter(user_roles::Column::UserId.eq(user_id))
            .all(&self.conn)
            .await
            .context("Failed to load existing role links")?
            .into_iter()
            .map(|link| link.role_id)
            .collect();

        let missing: Vec<user_roles::ActiveModel> = role_ids
            .iter()
            .filter(|role_id| !existing.contains(*role_id))
            .map(|role_id| user_roles::ActiveModel {
                user_id: Set(user_id),
                role_id: Set(*role_id),
            })
            .collect();

        if !missing.is_empty() {
            UserRoles::insert_many(missing)
                .exec(&self.conn)
                .await
                .context("Failed to insert role links")?;
        }

        Ok(())
    }

    /// Replace the user's role set with exactly `role_ids`, atomically.
    pub async fn sync(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
        let txn = self.conn.begin().await?;
        replace_role_links(&txn, user_id, role_ids).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Member counts per role via a grouped left join, so roles with zero
    /// members still show up.
    pub async fn roles_with_user_counts(&self) -> Result<Vec<RoleCount>> {
        Roles::find()
            .select_only()
            .column(roles::Column::Name)
            .column(roles::Column::DisplayName)
            .column_as(user_roles::Column::UserId.count(), "count")
            .join_rev(JoinType::LeftJoin, user_roles::Relation::Role.def())
            .group_by(roles::Column::Id)
            .order_by_asc(roles::Column::Id)
            .into_model::<RoleCount>()
            .all(&self.conn)
            .await
            .context("Failed to compute role member counts")
    }

    /// Users holding no role at all.
    pub async fn count_users_without_roles(&self) -> Result<u64> {
        let assigned = Query::select()
            .column(user_roles::Column::UserId)
            .from(UserRoles)
            .to_owned();

        Users::find()
            .filter(
                Expr::col(crate::entities::users::Column::Id)
                    .in_subquery(assigned)
                    .not(),
            )
            .count(&self.conn)
            .await
            .context("Failed to count users without roles")
    }
}

/// Delete-and-reinsert role links for one user. Runs on whatever connection
/// the caller supplies so it can join a larger transaction.
pub(crate) async fn replace_role_links<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    role_ids: &[i32],
) -> Result<()> {
    UserRoles::delete_many()
        .filter(user_roles::Column::UserId.eq(user_id))
        .exec(conn)
        .await
        .context("Failed to clear role links")?;

    if !role_ids.is_empty() {
        let links: Vec<user_roles::ActiveModel> = role_ids
            .iter()
            .map(|role_id| user_roles::ActiveModel {
                user_id: Set(user_id),
                role_id: Set(*role_id),
            })
            .collect();

        UserRoles::insert_many(links)
            .exec(conn)
            .await
            .context("Failed to insert role links")?;
    }

    Ok(())
}
