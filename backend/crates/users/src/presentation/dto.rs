//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::user::{User, UserProfile, UserStatus};

/// Public view of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_profile: UserProfile,
    pub status: UserStatus,
    pub scope: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into_string(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            user_profile: user.user_profile,
            status: user.status,
            scope: user.scope,
        }
    }
}
