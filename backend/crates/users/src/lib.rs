//! Users Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - User entity, repository trait
//! - `application/` - Use cases
//! - `infra/` - PostgreSQL and document-store implementations
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! The document-store repository is the generic repository bound to the
//! `users` collection; the PostgreSQL one reads the `users` table.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::GetUserUseCase;
pub use domain::repository::UserRepository;
pub use domain::user::{User, UserProfile, UserStatus};
pub use error::{UserError, UserResult};
pub use infra::document::{DocumentUserRepository, USERS_COLLECTION};
pub use infra::postgres::PgUserRepository;
pub use presentation::dto::UserResponse;
pub use presentation::router::users_router;
