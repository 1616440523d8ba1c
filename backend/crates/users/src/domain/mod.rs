//! Domain Layer
//!
//! User entity and repository interface.

pub mod repository;
pub mod user;
