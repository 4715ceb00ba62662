use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use crate::services::{password, roles};

use super::{ApiError, ApiResponse, AppState, UserDetailDto};

const SESSION_USER_KEY: &str = "user_id";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Gate for `/api/admin/*`: the session user must exist, be email-verified,
/// and hold the `admin` role.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(user_id) = session
        .get::<i32>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
    else {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    };

    let Some((user, user_roles)) = state
        .store()
        .get_user_with_roles(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load session user: {e:#}")))?
    else {
        // Stale session for a deleted user.
        let _ = session.flush().await;
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    };

    if user.email_verified_at.is_none() {
        return Err(ApiError::Forbidden("Email address not verified".to_string()));
    }

    if !roles::has_role(&user_roles, "admin") {
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }

    tracing::Span::current().record("user_id", user.id);
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with account and password, establishes a session on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserDetailDto>>, ApiError> {
    if payload.account.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user = state
        .store()
        .get_user_by_account(&payload.account)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e:#}")))?;

    let Some(user) = user else {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    };

    let is_valid = password::verify_password(&payload.password, &user.password_hash)
        .await
        .map_err(|e| ApiError::internal(format!("Password verification error: {e:#}")))?;

    if !is_valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    tracing::info!(user_id = user.id, account = %user.account, "Login");

    let detail = state.directory().get(user.id).await?;
    Ok(Json(ApiResponse::success(UserDetailDto::from(detail))))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    (StatusCode::OK, "Logged out")
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<UserDetailDto>>, ApiError> {
    let Some(user_id) = session
        .get::<i32>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
    else {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    };

    let detail = state.directory().get(user_id).await?;
    Ok(Json(ApiResponse::success(UserDetailDto::from(detail))))
}
