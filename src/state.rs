use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AvatarStore, DashboardService, RoleAssignmentService, UserDirectoryService,
};

/// Everything a request handler needs, wired once at startup.
#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub directory: UserDirectoryService,

    pub roles: RoleAssignmentService,

    pub dashboard: DashboardService,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let avatars = AvatarStore::new(config.general.storage_path.clone());

        let directory =
            UserDirectoryService::new(store.clone(), avatars, config.security.clone());
        let roles = RoleAssignmentService::new(store.clone());
        let dashboard = DashboardService::new(store.clone(), roles.clone());

        Ok(Self {
            config,
            store,
            directory,
            roles,
            dashboard,
        })
    }
}
