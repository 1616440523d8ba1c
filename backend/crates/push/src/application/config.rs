//! Push Configuration

use std::time::Duration;

use platform::config::{env_duration, env_parse, env_string};

/// FCM HTTP v1 endpoint
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Dispatcher and HTTP client settings
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Upper bound on retry rounds per dispatch
    pub max_retry: u32,
    /// Pause before each retry round
    pub retry_delay: Duration,
    pub fcm_endpoint: String,
    pub request_timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            max_retry: 3,
            retry_delay: Duration::from_secs(1),
            fcm_endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl PushConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_retry: env_parse("FCM_MAX_RETRY", d.max_retry),
            retry_delay: env_duration("FCM_RETRY_DELAY", d.retry_delay),
            fcm_endpoint: env_string("FCM_ENDPOINT", &d.fcm_endpoint),
            request_timeout: env_duration("FCM_REQUEST_TIMEOUT", d.request_timeout),
        }
    }

    /// Rounds allowed after the first send
    ///
    /// A positive request budget below the configured maximum wins.
    pub fn retry_budget(&self, requested: u32) -> u32 {
        if requested > 0 && requested < self.max_retry {
            requested
        } else {
            self.max_retry
        }
    }
}

/// One FCM app: its id and base64-encoded service-account JSON
#[derive(Clone, Default)]
pub struct FcmAppConfig {
    pub app_id: String,
    pub credential_base64: String,
    pub fcm_version: String,
}

impl FcmAppConfig {
    pub fn new(app_id: impl Into<String>, credential_base64: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            credential_base64: credential_base64.into(),
            fcm_version: "v1".to_string(),
        }
    }

    /// `None` when `FCM_APP_ID` is unset
    pub fn from_env() -> Option<Self> {
        let app_id = env_string("FCM_APP_ID", "");
        if app_id.is_empty() {
            return None;
        }
        Some(Self {
            app_id,
            credential_base64: env_string("FCM_CREDENTIAL_BASE64", ""),
            fcm_version: env_string("FCM_VERSION", "v1"),
        })
    }
}

impl std::fmt::Debug for FcmAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmAppConfig")
            .field("app_id", &self.app_id)
            .field("fcm_version", &self.fcm_version)
            .field("credential_base64", &"[REDACTED]")
            .finish()
    }
}
