//! Store Error Types
//!
//! Store-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.
//!
//! A lookup that matches nothing is not an error (`Ok(None)` / `(0, [])`).
//! A mutation the store accepted but that touched zero documents is
//! [`StoreError::Mutation`]. Driver failures pass through unchanged.

use std::fmt;

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Store-specific result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Which mutation reported zero affected documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    InsertFailed,
    UpdateFailed,
    BulkUpdateFailed,
    DeleteFailed,
    BulkDeleteFailed,
}

impl MutationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationKind::InsertFailed => "insert failed",
            MutationKind::UpdateFailed => "update failed",
            MutationKind::BulkUpdateFailed => "bulk write update failed",
            MutationKind::DeleteFailed => "delete failed",
            MutationKind::BulkDeleteFailed => "bulk write delete failed",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Well-formed request that affected no documents
    #[error("{op} in collection {collection}")]
    Mutation {
        op: MutationKind,
        collection: String,
    },

    /// A bulk operation was called with no entities
    #[error("empty batch for collection {0}")]
    EmptyBatch(String),

    #[error("MongoDB error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("Failed to decode document: {0}")]
    Decode(#[from] bson::de::Error),

    /// Store-reported failure that is not a driver error
    #[error("Store error: {0}")]
    Backend(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl StoreError {
    pub fn mutation(op: MutationKind, collection: impl Into<String>) -> Self {
        StoreError::Mutation {
            op,
            collection: collection.into(),
        }
    }

    /// The zero-effect mutation kind, if this is one
    pub fn mutation_kind(&self) -> Option<MutationKind> {
        match self {
            StoreError::Mutation { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Mutation { op, .. } => match op {
                MutationKind::InsertFailed => ErrorKind::InternalServerError,
                _ => ErrorKind::NotFound,
            },
            StoreError::EmptyBatch(_) => ErrorKind::BadRequest,
            StoreError::Database(e) if is_duplicate_key(e) => ErrorKind::Conflict,
            StoreError::Database(_) => ErrorKind::ServiceUnavailable,
            StoreError::Encode(_)
            | StoreError::Decode(_)
            | StoreError::Backend(_)
            | StoreError::Transaction(_) => ErrorKind::InternalServerError,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            StoreError::Database(e) => {
                tracing::error!(error = %e, "MongoDB error");
            }
            StoreError::Transaction(msg) | StoreError::Backend(msg) => {
                tracing::error!(message = %msg, "Store error");
            }
            StoreError::Decode(e) => {
                tracing::error!(error = %e, "Stored document does not match entity");
            }
            _ => {
                tracing::debug!(error = %self, "Store error");
            }
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind as MongoKind, WriteFailure};

    match err.kind.as_ref() {
        MongoKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        MongoKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        AppError::new(kind, message).with_source(err)
    }
}
