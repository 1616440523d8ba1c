//! Get User Use Case

use std::sync::Arc;

use store::EntityId;

use crate::domain::repository::UserRepository;
use crate::domain::user::User;
use crate::error::{UserError, UserResult};

pub struct GetUserUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
}

impl<R> GetUserUseCase<R>
where
    R: UserRepository + Sync,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, id: &EntityId) -> UserResult<User> {
        let user = self.repo.find_by_id(id).await?;
        user.ok_or(UserError::UserNotFound)
    }
}
