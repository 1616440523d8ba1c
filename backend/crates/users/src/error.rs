//! User Error Types
//!
//! User-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use store::StoreError;
use thiserror::Error;

/// User-specific result type alias
pub type UserResult<T> = Result<T, UserError>;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,

    /// Id is not valid for the backing store
    #[error("Invalid user id: {0}")]
    InvalidId(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::UserNotFound => ErrorKind::NotFound,
            UserError::InvalidId(_) => ErrorKind::BadRequest,
            UserError::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            UserError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                ErrorKind::ServiceUnavailable
            }
            UserError::Database(_) => ErrorKind::InternalServerError,
            UserError::Store(e) => e.kind(),
            UserError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            UserError::Database(e) => {
                tracing::error!(error = %e, "User database error");
            }
            UserError::Store(e) => e.log(),
            UserError::Internal(msg) => {
                tracing::error!(message = %msg, "User internal error");
            }
            _ => {
                tracing::debug!(error = %self, "User error");
            }
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Database(e) => AppError::from(e),
            UserError::Store(e) => AppError::from(e),
            other => AppError::new(other.kind(), other.to_string()),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
