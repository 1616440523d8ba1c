//! Document Store Repository Implementation
//!
//! The generic repository bound to the `users` collection.

use std::sync::Arc;

use store::{DocumentStore, EntityId, GenericRepository};

use crate::domain::repository::UserRepository;
use crate::domain::user::User;
use crate::error::UserResult;

pub const USERS_COLLECTION: &str = "users";

pub struct DocumentUserRepository<S: DocumentStore> {
    repo: GenericRepository<User, S>,
}

impl<S: DocumentStore> DocumentUserRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            repo: GenericRepository::new(store, USERS_COLLECTION),
        }
    }

    /// Full generic repository for writes and batch operations
    pub fn generic(&self) -> &GenericRepository<User, S> {
        &self.repo
    }
}

impl<S: DocumentStore> Clone for DocumentUserRepository<S> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<S: DocumentStore> UserRepository for DocumentUserRepository<S> {
    async fn find_by_id(&self, id: &EntityId) -> UserResult<Option<User>> {
        Ok(self.repo.get_by_id(id).await?)
    }
}
