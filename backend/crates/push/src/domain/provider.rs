//! Messaging provider seam
//!
//! A provider sends one multicast and reports one outcome per token, in
//! token order. `Err` from `send_multicast` means the call as a whole
//! failed and nothing is known about individual tokens.

use thiserror::Error;

use crate::domain::credential::AccessCredential;
use crate::domain::message::MulticastMessage;
use crate::error::PushResult;

/// Per-token delivery failure reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("missing registration token")]
    MissingRegistration,

    #[error("invalid registration token")]
    InvalidRegistration,

    #[error("unregistered device")]
    NotRegistered,

    #[error("invalid package name")]
    InvalidPackageName,

    #[error("mismatched sender id")]
    MismatchSenderId,

    #[error("message is too big")]
    MessageTooBig,

    #[error("invalid data key")]
    InvalidDataKey,

    #[error("invalid time to live")]
    InvalidTtl,

    #[error("device message rate exceeded")]
    DeviceMessageRateExceeded,

    #[error("topics message rate exceeded")]
    TopicsMessageRateExceeded,

    #[error("check that the provided parameters have the right name and type")]
    InvalidParameters,

    #[error("invalid APNs credentials")]
    InvalidApnsCredential,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider internal error: {0}")]
    Internal(String),

    #[error("unknown error type: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Terminal for this token; retrying cannot succeed
    pub fn is_unregistered(&self) -> bool {
        matches!(
            self,
            ProviderError::NotRegistered
                | ProviderError::MismatchSenderId
                | ProviderError::MissingRegistration
                | ProviderError::InvalidRegistration
        )
    }

    /// Classify an FCM error code (HTTP v1 or legacy spelling)
    pub fn from_fcm_code(code: &str, message: &str) -> Self {
        match code {
            "UNREGISTERED" | "NotRegistered" => ProviderError::NotRegistered,
            "SENDER_ID_MISMATCH" | "MismatchSenderId" => ProviderError::MismatchSenderId,
            "MissingRegistration" => ProviderError::MissingRegistration,
            "InvalidRegistration" => ProviderError::InvalidRegistration,
            "InvalidPackageName" => ProviderError::InvalidPackageName,
            "MessageTooBig" => ProviderError::MessageTooBig,
            "InvalidDataKey" => ProviderError::InvalidDataKey,
            "InvalidTtl" => ProviderError::InvalidTtl,
            "QUOTA_EXCEEDED" | "DeviceMessageRateExceeded" => {
                ProviderError::DeviceMessageRateExceeded
            }
            "TopicsMessageRateExceeded" => ProviderError::TopicsMessageRateExceeded,
            "INVALID_ARGUMENT" | "InvalidParameters" => ProviderError::InvalidParameters,
            "THIRD_PARTY_AUTH_ERROR" => ProviderError::InvalidApnsCredential,
            "UNAVAILABLE" | "Unavailable" => ProviderError::Unavailable(message.to_string()),
            "INTERNAL" | "InternalServerError" => ProviderError::Internal(message.to_string()),
            _ => ProviderError::Unknown(message.to_string()),
        }
    }
}

/// Outcome of one token within a multicast
pub type TokenOutcome = Result<(), ProviderError>;

#[trait_variant::make(MessagingProvider: Send)]
pub trait LocalMessagingProvider {
    async fn send_multicast(
        &self,
        credential: &AccessCredential,
        message: &MulticastMessage,
    ) -> PushResult<Vec<TokenOutcome>>;
}
