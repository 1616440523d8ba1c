//! Push Error Types
//!
//! Call-level failures of a dispatch. Per-token delivery failures are
//! [`ProviderError`](crate::domain::provider::ProviderError) values and end
//! up in the response list instead.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Push-specific result type alias
pub type PushResult<T> = Result<T, PushError>;

#[derive(Debug, Clone, Error)]
pub enum PushError {
    /// Request failed structural checks; nothing was sent
    #[error("{0}")]
    Validation(String),

    /// Access credential could not be obtained
    #[error("credential error: {0}")]
    Credential(String),

    /// The provider call itself failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Rejected by the circuit breaker without calling the provider
    #[error("circuit breaker {0} is open")]
    CircuitOpen(String),

    /// No app configuration registered under this id
    #[error("unknown app id: {0}")]
    UnknownApp(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PushError {
    pub fn validation(message: impl Into<String>) -> Self {
        PushError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::Validation(_) => ErrorKind::BadRequest,
            PushError::UnknownApp(_) => ErrorKind::NotFound,
            PushError::Credential(_) | PushError::Transport(_) => ErrorKind::BadGateway,
            PushError::CircuitOpen(_) => ErrorKind::ServiceUnavailable,
            PushError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            PushError::Credential(msg) | PushError::Transport(msg) => {
                tracing::error!(message = %msg, "Push provider error");
            }
            PushError::Internal(msg) => {
                tracing::error!(message = %msg, "Push internal error");
            }
            PushError::CircuitOpen(name) => {
                tracing::warn!(breaker = %name, "Push rejected by open circuit");
            }
            _ => {
                tracing::debug!(error = %self, "Push error");
            }
        }
    }
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        PushError::Transport(err.to_string())
    }
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}
