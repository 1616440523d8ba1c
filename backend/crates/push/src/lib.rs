//! Push Notification Module
//!
//! Clean Architecture structure:
//! - `domain/` - Requests, delivery reports, provider and credential seams
//! - `application/` - Dispatcher, credential registry, configuration
//! - `infra/` - FCM HTTP v1 client, Google service-account credentials
//!
//! ## Delivery contract
//! - A request is validated before any network call
//! - Tokens that failed for a retriable reason are resent after a fixed
//!   delay, up to the retry budget
//! - Unregistered tokens are reported once and never retried

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::{CredentialRegistry, Dispatcher, FcmAppConfig, PushConfig};
pub use domain::credential::{AccessCredential, CredentialSource};
pub use domain::message::MulticastMessage;
pub use domain::notification::{Platform, Priority, PushNotification};
pub use domain::provider::{MessagingProvider, ProviderError, TokenOutcome};
pub use domain::response::{PushResponse, PushStatus};
pub use error::{PushError, PushResult};
pub use infra::fcm::FcmClient;
pub use infra::google_auth::ServiceAccountSource;

#[cfg(test)]
mod tests;
