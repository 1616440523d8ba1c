//! Provider access credential

use chrono::{DateTime, Utc};

use crate::error::PushResult;

/// Short-lived OAuth2 access token bound to one FCM project
#[derive(Clone)]
pub struct AccessCredential {
    pub access_token: String,
    pub project_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("project_id", &self.project_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Exchanges an app's service-account credential for an access token
#[trait_variant::make(CredentialSource: Send)]
pub trait LocalCredentialSource {
    async fn fetch(&self, app_id: &str, credential_base64: &str) -> PushResult<AccessCredential>;
}
