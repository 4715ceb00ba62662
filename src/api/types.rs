use serde::{Deserialize, Serialize};

use crate::entities::{permissions, roles, users};
use crate::services::{
    RoleMembership, UserDetail, UserPage, UserStats, UserWithRoles, ValidationErrors,
};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only for validation failures: field name to messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<std::collections::BTreeMap<String, Vec<String>>>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: None,
        }
    }

    pub fn validation_error(errors: ValidationErrors) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(errors.summary()),
            errors: Some(errors.errors),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct RoleDto {
    pub id: i32,
    pub name: String,
    pub display_name: Option<String>,
}

impl From<roles::Model> for RoleDto {
    fn from(model: roles::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            display_name: model.display_name,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PermissionDto {
    pub id: i32,
    pub name: String,
}

impl From<permissions::Model> for PermissionDto {
    fn from(model: permissions::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// User representation sent to the frontend. The password hash never leaves
/// the service layer.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub name: String,
    pub account: String,
    pub email: String,
    pub email_verified_at: Option<String>,
    pub avatar: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub roles: Vec<RoleDto>,
}

fn avatar_url(avatar: Option<&str>) -> Option<String> {
    avatar.map(|path| format!("/storage/{path}"))
}

impl UserDto {
    fn from_parts(user: users::Model, user_roles: Vec<roles::Model>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            account: user.account,
            email: user.email,
            email_verified_at: user.email_verified_at,
            avatar_url: avatar_url(user.avatar.as_deref()),
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles: user_roles.into_iter().map(RoleDto::from).collect(),
        }
    }
}

impl From<UserWithRoles> for UserDto {
    fn from(value: UserWithRoles) -> Self {
        Self::from_parts(value.user, value.roles)
    }
}

#[derive(Debug, Serialize)]
pub struct UserDetailDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub permissions: Vec<PermissionDto>,
}

impl From<UserDetail> for UserDetailDto {
    fn from(detail: UserDetail) -> Self {
        Self {
            user: UserDto::from_parts(detail.user, detail.roles),
            permissions: detail
                .permissions
                .into_iter()
                .map(PermissionDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPageDto {
    pub users: Vec<UserDto>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl From<UserPage> for UserPageDto {
    fn from(page: UserPage) -> Self {
        let total_pages = if page.per_page == 0 {
            0
        } else {
            page.total.div_ceil(page.per_page)
        };

        Self {
            users: page.users.into_iter().map(UserDto::from).collect(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserStatsDto {
    pub total: u64,
    pub active: u64,
    pub new_this_month: u64,
}

impl From<UserStats> for UserStatsDto {
    fn from(stats: UserStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            new_this_month: stats.new_this_month,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleCountDto {
    pub name: String,
    pub display_name: String,
    pub count: u64,
}

impl From<RoleMembership> for RoleCountDto {
    fn from(membership: RoleMembership) -> Self {
        Self {
            name: membership.name,
            display_name: membership.display_name,
            count: membership.count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardDto {
    pub user_stats: UserStatsDto,
    pub role_stats: Vec<RoleCountDto>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub account: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub email_verified: bool,
}
