use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DashboardDto, RoleCountDto, UserStatsDto};

/// GET /admin
/// User totals and per-role membership counts.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<DashboardDto>>, ApiError> {
    let user_stats = state.dashboard().user_stats(chrono::Utc::now()).await?;
    let role_stats = state.dashboard().role_stats().await?;

    Ok(Json(ApiResponse::success(DashboardDto {
        user_stats: UserStatsDto::from(user_stats),
        role_stats: role_stats.into_iter().map(RoleCountDto::from).collect(),
    })))
}
