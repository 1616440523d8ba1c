//! Application Layer
//!
//! Use cases.

pub mod get_user;

// Re-exports
pub use get_user::GetUserUseCase;
