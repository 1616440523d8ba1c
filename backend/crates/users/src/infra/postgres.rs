//! PostgreSQL Repository Implementation

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use store::EntityId;
use uuid::Uuid;

use crate::domain::repository::UserRepository;
use crate::domain::user::{User, UserProfile};
use crate::error::{UserError, UserResult};

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &EntityId) -> UserResult<Option<User>> {
        let uuid = id
            .to_uuid()
            .ok_or_else(|| UserError::InvalidId(id.to_string()))?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                created_at,
                updated_at,
                user_profile,
                refresh_token_encrypted,
                status,
                scope
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_profile: Json<UserProfile>,
    refresh_token_encrypted: Option<String>,
    status: String,
    scope: Option<Vec<String>>,
}

impl UserRow {
    fn into_user(self) -> UserResult<User> {
        let status = self
            .status
            .parse()
            .map_err(|e: String| UserError::Internal(format!("Invalid status: {}", e)))?;

        Ok(User {
            id: EntityId::from_uuid(self.id),
            created_at: self.created_at,
            updated_at: self.updated_at,
            user_profile: self.user_profile.0,
            refresh_token_encrypted: self.refresh_token_encrypted.unwrap_or_default(),
            status,
            scope: self.scope.unwrap_or_default(),
        })
    }
}
