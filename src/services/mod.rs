pub mod avatar;
pub mod dashboard;
pub mod directory;
pub mod error;
pub mod password;
pub mod roles;
pub mod validation;

pub use avatar::AvatarStore;
pub use dashboard::{DashboardService, UserStats};
pub use directory::{
    CreateUser, DEFAULT_PAGE_SIZE, UpdateUser, UserDetail, UserDirectoryService, UserPage,
    UserWithRoles,
};
pub use error::ServiceError;
pub use roles::{RoleAssignmentService, RoleMembership};
pub use validation::ValidationErrors;
