//! Provider-facing multicast message

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::domain::notification::{DEFAULT_TIME_TO_LIVE, Priority, PushNotification};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidConfig {
    pub priority: Priority,
    pub ttl: Duration,
    pub collapse_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnsConfig {
    pub headers: BTreeMap<String, String>,
    pub mutable_content: bool,
    pub content_available: bool,
}

/// One send: the same payload for every token, or for a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub topic: Option<String>,
    pub notification: Option<Notification>,
    pub android: AndroidConfig,
    pub apns: ApnsConfig,
    pub data: BTreeMap<String, String>,
}

impl MulticastMessage {
    /// Build the message for `targets`, the request's current token subset
    pub fn from_notification(request: &PushNotification, targets: &[String]) -> Self {
        let ttl = request.time_to_live.unwrap_or(DEFAULT_TIME_TO_LIVE);

        let notification = (!request.title.is_empty()
            || !request.message.is_empty()
            || !request.image.is_empty())
        .then(|| Notification {
            title: request.title.clone(),
            body: request.message.clone(),
            image: request.image.clone(),
        });

        let (tokens, topic) = if request.is_topic() {
            (Vec::new(), Some(request.to.clone()))
        } else {
            (targets.to_vec(), None)
        };

        let mut headers = BTreeMap::new();
        headers.insert("apns-priority".to_string(), "10".to_string());

        Self {
            tokens,
            topic,
            notification,
            android: AndroidConfig {
                priority: request.priority,
                ttl: Duration::from_secs(u64::from(ttl)),
                collapse_key: request.collapse_key.clone(),
            },
            apns: ApnsConfig {
                headers,
                mutable_content: true,
                content_available: true,
            },
            data: request
                .data
                .iter()
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect(),
        }
    }

    /// Number of outcomes a provider must report
    pub fn target_count(&self) -> usize {
        if self.topic.is_some() { 1 } else { self.tokens.len() }
    }
}

/// FCM data values are strings
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
