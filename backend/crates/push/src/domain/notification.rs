//! Push notification request

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PushError, PushResult};

/// Largest multicast accepted for Android
pub const MAX_ANDROID_TOKENS: usize = 1000;

/// Four weeks, the longest TTL FCM accepts
pub const MAX_TIME_TO_LIVE: u32 = 2_419_200;

/// TTL applied when the request carries none
pub const DEFAULT_TIME_TO_LIVE: u32 = 5;

/// Target device platform, carried on the wire as `1`/`2`/`3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Platform {
    Ios,
    Android,
    Huawei,
}

impl From<Platform> for u8 {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Ios => 1,
            Platform::Android => 2,
            Platform::Huawei => 3,
        }
    }
}

impl TryFrom<u8> for Platform {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Platform::Ios),
            2 => Ok(Platform::Android),
            3 => Ok(Platform::Huawei),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// One dispatch request
///
/// The dispatcher only reads it; retries narrow a private copy of `tokens`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotification {
    #[serde(default)]
    pub notif_id: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    pub platform: Platform,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub content_available: bool,
    #[serde(default)]
    pub mutable_content: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Retry budget for this request; `0` uses the configured maximum
    #[serde(default)]
    pub retry: u32,
    /// Topic target, used when `tokens` is empty
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub collapse_key: String,
    /// Seconds
    #[serde(default)]
    pub time_to_live: Option<u32>,
    #[serde(default)]
    pub app_id: String,
}

impl PushNotification {
    pub fn new(platform: Platform, tokens: Vec<String>) -> Self {
        Self {
            notif_id: String::new(),
            tokens,
            platform,
            message: String::new(),
            title: String::new(),
            image: String::new(),
            priority: Priority::Normal,
            content_available: false,
            mutable_content: false,
            data: Map::new(),
            retry: 0,
            to: String::new(),
            collapse_key: String::new(),
            time_to_live: None,
            app_id: String::new(),
        }
    }

    /// Structural checks run before any network call
    pub fn validate(&self) -> PushResult<()> {
        if self.tokens.is_empty() && self.to.is_empty() {
            return Err(PushError::validation(
                "the message must specify at least one registration ID",
            ));
        }

        if self.tokens.len() == 1 && self.tokens[0].is_empty() {
            return Err(PushError::validation("the token must not be empty"));
        }

        if self.platform == Platform::Android && self.tokens.len() > MAX_ANDROID_TOKENS {
            return Err(PushError::validation(
                "the message may specify at most 1000 registration IDs",
            ));
        }

        if self.platform == Platform::Android
            && self.time_to_live.is_some_and(|ttl| ttl > MAX_TIME_TO_LIVE)
        {
            return Err(PushError::validation(
                "the message's TimeToLive field must be an integer between 0 and 2419200 (4 weeks)",
            ));
        }

        Ok(())
    }

    /// Delivery targets: the tokens, or the topic when there are none
    pub fn targets(&self) -> Vec<String> {
        if self.tokens.is_empty() {
            vec![self.to.clone()]
        } else {
            self.tokens.clone()
        }
    }

    pub fn is_topic(&self) -> bool {
        self.tokens.is_empty()
    }
}
