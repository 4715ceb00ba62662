use crate::entities::prelude::*;
use crate::entities::{permissions, role_permissions, roles, user_roles, users};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;
use sea_orm_migration::sea_query::Query;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Hash the seed password using Argon2id
fn hash_seed_password() -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let password = b"password";
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password, &salt)
        .expect("Failed to hash seed password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Roles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserRoles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Permissions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(RolePermissions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Seed the admin role, its permission, and two bootstrap users.
        let now = chrono::Utc::now().to_rfc3339();
        let password_hash = hash_seed_password();

        let insert_role = Query::insert()
            .into_table(Roles)
            .columns([roles::Column::Name, roles::Column::DisplayName])
            .values_panic(["admin".into(), "Administrator".into()])
            .to_owned();
        manager.exec_stmt(insert_role).await?;

        let insert_permission = Query::insert()
            .into_table(Permissions)
            .columns([permissions::Column::Name])
            .values_panic(["manage users".into()])
            .to_owned();
        manager.exec_stmt(insert_permission).await?;

        let insert_role_permission = Query::insert()
            .into_table(RolePermissions)
            .columns([
                role_permissions::Column::RoleId,
                role_permissions::Column::PermissionId,
            ])
            .values_panic([1.into(), 1.into()])
            .to_owned();
        manager.exec_stmt(insert_role_permission).await?;

        let user_columns = [
            users::Column::Name,
            users::Column::Account,
            users::Column::Email,
            users::Column::PasswordHash,
            users::Column::EmailVerifiedAt,
            users::Column::CreatedAt,
            users::Column::UpdatedAt,
        ];

        let insert_admin = Query::insert()
            .into_table(Users)
            .columns(user_columns)
            .values_panic([
                "Administrator".into(),
                "admin".into(),
                "admin@example.com".into(),
                password_hash.clone().into(),
                now.clone().into(),
                now.clone().into(),
                now.clone().into(),
            ])
            .to_owned();
        manager.exec_stmt(insert_admin).await?;

        let insert_test_user = Query::insert()
            .into_table(Users)
            .columns(user_columns)
            .values_panic([
                "Test User".into(),
                "test".into(),
                "test@example.com".into(),
                password_hash.into(),
                now.clone().into(),
                now.clone().into(),
                now.into(),
            ])
            .to_owned();
        manager.exec_stmt(insert_test_user).await?;

        let link_admin_role = Query::insert()
            .into_table(UserRoles)
            .columns([user_roles::Column::UserId, user_roles::Column::RoleId])
            .values_panic([1.into(), 1.into()])
            .to_owned();
        manager.exec_stmt(link_admin_role).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RolePermissions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Permissions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserRoles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
