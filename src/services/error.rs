use thiserror::Error;

use super::validation::ValidationErrors;

/// Errors shared by the directory, role-assignment, and dashboard services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i32 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        // Concurrent duplicate account/email creation surfaces as a UNIQUE
        // constraint DbErr rather than a pre-flight validation failure.
        let message = format!("{err:#}");
        if message.contains("UNIQUE constraint failed") {
            Self::Conflict("account or email is already taken".to_string())
        } else {
            Self::Database(message)
        }
    }
}

impl ServiceError {
    pub fn validation(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }

    pub fn user_not_found(id: i32) -> Self {
        Self::NotFound {
            resource: "User",
            id,
        }
    }
}
