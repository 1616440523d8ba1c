//! User Router

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::domain::repository::UserRepository;
use crate::presentation::handlers::{self, UserAppState};

/// Routes relative to the users base path
pub fn users_router<R>(repo: R) -> Router
where
    R: UserRepository + Send + Sync + 'static,
{
    let state = UserAppState {
        repo: Arc::new(repo),
    };

    Router::new()
        .route("/{id}", get(handlers::get_user::<R>))
        .with_state(state)
}
