//! Application Layer
//!
//! Dispatcher, credential registry and configuration.

pub mod config;
pub mod credentials;
pub mod dispatcher;

// Re-exports
pub use config::{FcmAppConfig, PushConfig};
pub use credentials::CredentialRegistry;
pub use dispatcher::Dispatcher;
