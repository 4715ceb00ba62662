use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{StatusFilter, UserFilter};
use crate::services::{CreateUser, DEFAULT_PAGE_SIZE, UpdateUser};

use super::{
    ApiError, ApiResponse, AppState, CreateUserRequest, RoleDto, UserDetailDto, UserPageDto,
};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<u64>,
}

fn parse_filter(query: &UserListQuery) -> UserFilter {
    // Unknown status values fall through to "no constraint".
    let status = match query.status.as_deref() {
        Some("active") => Some(StatusFilter::Active),
        Some("inactive") => Some(StatusFilter::Inactive),
        _ => None,
    };

    UserFilter {
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        status,
    }
}

/// GET /admin/users?search=&status=&page=
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<UserPageDto>>, ApiError> {
    let filter = parse_filter(&query);
    let page = query.page.unwrap_or(1);

    let result = state
        .directory()
        .list(&filter, page, DEFAULT_PAGE_SIZE)
        .await?;

    Ok(Json(ApiResponse::success(UserPageDto::from(result))))
}

/// GET /admin/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDetailDto>>, ApiError> {
    let detail = state.directory().get(id).await?;
    Ok(Json(ApiResponse::success(UserDetailDto::from(detail))))
}

#[derive(Debug, Serialize)]
pub struct CreateFormDto {
    pub roles: Vec<RoleDto>,
}

/// GET /admin/users/create
/// Role options for the create form.
pub async fn create_form(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CreateFormDto>>, ApiError> {
    let roles = state.roles().list_roles().await?;
    Ok(Json(ApiResponse::success(CreateFormDto {
        roles: roles.into_iter().map(RoleDto::from).collect(),
    })))
}

/// POST /admin/users
pub async fn store_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDetailDto>>), ApiError> {
    let input = CreateUser {
        name: payload.name,
        account: payload.account,
        email: payload.email,
        password: payload.password,
        roles: payload.roles,
        email_verified: payload.email_verified,
    };

    let detail = state.directory().create(input, chrono::Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDetailDto::from(detail))),
    ))
}

#[derive(Debug, Serialize)]
pub struct EditFormDto {
    pub user: UserDetailDto,
    pub roles: Vec<RoleDto>,
}

/// GET /admin/users/{id}/edit
/// User plus role options for the edit form.
pub async fn edit_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<EditFormDto>>, ApiError> {
    let detail = state.directory().get(id).await?;
    let roles = state.roles().list_roles().await?;

    Ok(Json(ApiResponse::success(EditFormDto {
        user: UserDetailDto::from(detail),
        roles: roles.into_iter().map(RoleDto::from).collect(),
    })))
}

/// PUT/PATCH /admin/users/{id}
///
/// Multipart form so the avatar file can ride along with the field edits.
/// The `roles` field may repeat; sending it at all (even with an empty
/// value) replaces the role set, while leaving it out keeps the current set.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UserDetailDto>>, ApiError> {
    let mut input = UpdateUser::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::internal(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        match name.as_str() {
            "avatar" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::internal(format!("Failed to read avatar: {e}")))?;
                if !bytes.is_empty() {
                    input.avatar = Some(bytes.to_vec());
                }
            }
            text_field => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::internal(format!("Failed to read field: {e}")))?;

                match text_field {
                    "name" => input.name = value,
                    "account" => input.account = value,
                    "email" => input.email = value,
                    "email_verified" => {
                        input.email_verified = matches!(value.as_str(), "true" | "1" | "on");
                    }
                    "roles" | "roles[]" => {
                        let list = input.roles.get_or_insert_with(Vec::new);
                        if !value.is_empty() {
                            list.push(value);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let detail = state
        .directory()
        .update(id, input, chrono::Utc::now())
        .await?;

    Ok(Json(ApiResponse::success(UserDetailDto::from(detail))))
}

/// DELETE /admin/users/{id}
pub async fn destroy_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.directory().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
