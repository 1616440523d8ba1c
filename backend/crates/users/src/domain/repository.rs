//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the infra layer.

use store::EntityId;

use crate::domain::user::User;
use crate::error::UserResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Find user by ID
    async fn find_by_id(&self, id: &EntityId) -> UserResult<Option<User>>;
}
