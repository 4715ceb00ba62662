use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{permissions, roles, users};

pub mod migrator;
pub mod repositories;

pub use repositories::role::RoleCount;
pub use repositories::user::{NewUser, StatusFilter, UserChanges, UserFilter};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn role_repo(&self) -> repositories::role::RoleRepository {
        repositories::role::RoleRepository::new(self.conn.clone())
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<(users::Model, Vec<roles::Model>)>, u64)> {
        self.user_repo().list(filter, page, per_page).await
    }

    pub async fn get_user_with_roles(
        &self,
        id: i32,
    ) -> Result<Option<(users::Model, Vec<roles::Model>)>> {
        self.user_repo().get_with_roles(id).await
    }

    pub async fn get_user_by_account(&self, account: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_account(account).await
    }

    pub async fn account_taken(&self, account: &str, exclude_id: Option<i32>) -> Result<bool> {
        self.user_repo().account_taken(account, exclude_id).await
    }

    pub async fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> Result<bool> {
        self.user_repo().email_taken(email, exclude_id).await
    }

    pub async fn create_user(
        &self,
        new: NewUser,
        role_ids: &[i32],
        now: &str,
    ) -> Result<users::Model> {
        self.user_repo().create(new, role_ids, now).await
    }

    pub async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
        role_ids: Option<&[i32]>,
    ) -> Result<Option<users::Model>> {
        self.user_repo().update(id, changes, role_ids).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count_all().await
    }

    pub async fn count_verified_users(&self) -> Result<u64> {
        self.user_repo().count_verified().await
    }

    pub async fn count_users_created_between(&self, start: &str, end: &str) -> Result<u64> {
        self.user_repo().count_created_between(start, end).await
    }

    pub async fn list_roles(&self) -> Result<Vec<roles::Model>> {
        self.role_repo().list_all().await
    }

    pub async fn find_roles_by_names(&self, names: &[String]) -> Result<Vec<roles::Model>> {
        self.role_repo().find_by_names(names).await
    }

    pub async fn permissions_for_roles(
        &self,
        role_ids: &[i32],
    ) -> Result<Vec<permissions::Model>> {
        self.role_repo().permissions_for_roles(role_ids).await
    }

    pub async fn assign_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
        self.role_repo().assign(user_id, role_ids).await
    }

    pub async fn sync_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
        self.role_repo().sync(user_id, role_ids).await
    }

    pub async fn roles_with_user_counts(&self) -> Result<Vec<RoleCount>> {
        self.role_repo().roles_with_user_counts().await
    }

    pub async fn count_users_without_roles(&self) -> Result<u64> {
        self.role_repo().count_users_without_roles().await
    }
}
