use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod dashboard;
mod error;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn directory(&self) -> &crate::services::UserDirectoryService {
        &self.shared.directory
    }

    #[must_use]
    pub fn roles(&self) -> &crate::services::RoleAssignmentService {
        &self.shared.roles
    }

    #[must_use]
    pub fn dashboard(&self) -> &crate::services::DashboardService {
        &self.shared.dashboard
    }
}

pub async fn create_app_state(shared: Arc<SharedState>) -> anyhow::Result<Arc<AppState>> {
    Ok(Arc::new(AppState { shared }))
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    create_app_state(shared).await
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let storage_path = config.general.storage_path.clone();
    let cors_origins = config.server.cors_allowed_origins.clone();
    let session_ttl = config.server.session_ttl_minutes;

    let admin_routes = create_admin_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(session_ttl)));

    let api_router = Router::new()
        .nest("/admin", admin_routes)
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // The avatar size rule is enforced in validation; the transport limit
        // just has to sit above it.
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .nest_service(
            "/storage",
            tower_http::services::ServeDir::new(storage_path),
        )
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/users", get(users::list_users))
        .route("/users", post(users::store_user))
        .route("/users/create", get(users::create_form))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user).patch(users::update_user))
        .route("/users/{id}", delete(users::destroy_user))
        .route("/users/{id}/edit", get(users::edit_form))
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin))
}
