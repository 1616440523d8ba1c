//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use kernel::response::ApiResponse;
use store::EntityId;

use crate::application::GetUserUseCase;
use crate::domain::repository::UserRepository;
use crate::error::UserResult;
use crate::presentation::dto::UserResponse;

/// Shared state for user handlers
pub struct UserAppState<R> {
    pub repo: Arc<R>,
}

impl<R> Clone for UserAppState<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

/// GET /aaa/v1/users/{id}
pub async fn get_user<R>(
    State(state): State<UserAppState<R>>,
    Path(id): Path<String>,
) -> UserResult<Json<ApiResponse<UserResponse>>>
where
    R: UserRepository + Send + Sync + 'static,
{
    let use_case = GetUserUseCase::new(state.repo.clone());
    let user = use_case.execute(&EntityId::from_string(id)).await?;

    Ok(Json(ApiResponse::ok(UserResponse::from(user))))
}
