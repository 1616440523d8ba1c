//! FCM HTTP v1 client
//!
//! HTTP v1 has no multicast endpoint, so a multicast is one
//! `messages:send` request per token. Requests are issued concurrently in
//! batches of at most [`MAX_CONCURRENT_SENDS`]; outcomes keep token order.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::application::config::PushConfig;
use crate::domain::credential::AccessCredential;
use crate::domain::message::MulticastMessage;
use crate::domain::notification::Priority;
use crate::domain::provider::{MessagingProvider, ProviderError, TokenOutcome};
use crate::error::PushResult;

/// In-flight `messages:send` requests per multicast
pub const MAX_CONCURRENT_SENDS: usize = 500;

#[derive(Debug, Clone)]
pub struct FcmClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FcmClient {
    pub fn new(config: &PushConfig) -> PushResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(http, &config.fcm_endpoint))
    }

    pub fn with_client(http: reqwest::Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn send_url(&self, project_id: &str) -> String {
        format!("{}/v1/projects/{}/messages:send", self.endpoint, project_id)
    }

    async fn send_one(&self, url: &str, access_token: &str, body: SendRequest<'_>) -> TokenOutcome {
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text))
    }
}

impl MessagingProvider for FcmClient {
    async fn send_multicast(
        &self,
        credential: &AccessCredential,
        message: &MulticastMessage,
    ) -> PushResult<Vec<TokenOutcome>> {
        let url = self.send_url(&credential.project_id);
        let wire = WireMessage::from(message);

        let outcomes = match &message.topic {
            Some(topic) => {
                let body = SendRequest {
                    message: wire.target(Target::Topic(topic)),
                };
                vec![self.send_one(&url, &credential.access_token, body).await]
            }
            None => {
                let mut outcomes = Vec::with_capacity(message.tokens.len());
                for batch in message.tokens.chunks(MAX_CONCURRENT_SENDS) {
                    let sends = batch.iter().map(|token| {
                        let body = SendRequest {
                            message: wire.target(Target::Token(token)),
                        };
                        self.send_one(&url, &credential.access_token, body)
                    });
                    outcomes.extend(join_all(sends).await);
                }
                outcomes
            }
        };

        tracing::debug!(
            project_id = %credential.project_id,
            sent = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.is_err()).count(),
            "FCM multicast sent"
        );

        Ok(outcomes)
    }
}

// ============================================================================
// Wire format
// ============================================================================

enum Target<'a> {
    Token(&'a str),
    Topic(&'a str),
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: WireMessage<'a>,
}

#[derive(Serialize, Clone)]
struct WireMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<WireNotification<'a>>,
    #[serde(skip_serializing_if = "is_empty_map")]
    data: &'a BTreeMap<String, String>,
    android: WireAndroid<'a>,
    apns: WireApns<'a>,
}

impl<'a> WireMessage<'a> {
    fn target(&self, target: Target<'a>) -> Self {
        let mut message = self.clone();
        match target {
            Target::Token(token) => message.token = Some(token),
            Target::Topic(topic) => message.topic = Some(topic),
        }
        message
    }
}

impl<'a> From<&'a MulticastMessage> for WireMessage<'a> {
    fn from(message: &'a MulticastMessage) -> Self {
        Self {
            token: None,
            topic: None,
            notification: message.notification.as_ref().map(|n| WireNotification {
                title: non_empty(&n.title),
                body: non_empty(&n.body),
                image: non_empty(&n.image),
            }),
            data: &message.data,
            android: WireAndroid {
                priority: match message.android.priority {
                    Priority::High => "HIGH",
                    Priority::Normal => "NORMAL",
                },
                ttl: format!("{}s", message.android.ttl.as_secs()),
                collapse_key: non_empty(&message.android.collapse_key),
            },
            apns: WireApns {
                headers: &message.apns.headers,
                payload: WireApnsPayload {
                    aps: WireAps {
                        mutable_content: u8::from(message.apns.mutable_content),
                        content_available: u8::from(message.apns.content_available),
                    },
                },
            },
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn is_empty_map(map: &&BTreeMap<String, String>) -> bool {
    map.is_empty()
}

#[derive(Serialize, Clone)]
struct WireNotification<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Serialize, Clone)]
struct WireAndroid<'a> {
    priority: &'static str,
    ttl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    collapse_key: Option<&'a str>,
}

#[derive(Serialize, Clone)]
struct WireApns<'a> {
    headers: &'a BTreeMap<String, String>,
    payload: WireApnsPayload,
}

#[derive(Serialize, Clone)]
struct WireApnsPayload {
    aps: WireAps,
}

#[derive(Serialize, Clone)]
struct WireAps {
    #[serde(rename = "mutable-content")]
    mutable_content: u8,
    #[serde(rename = "content-available")]
    content_available: u8,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Map a non-2xx response to a per-token error
///
/// The FCM-specific `errorCode` detail wins over the generic status.
fn classify_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let error = envelope.error;
            let code = error
                .details
                .iter()
                .find_map(|d| d.error_code.as_deref())
                .unwrap_or(error.status.as_str());
            ProviderError::from_fcm_code(code, &error.message)
        }
        Err(_) if status >= 500 => ProviderError::Unavailable(format!("HTTP {status}")),
        Err(_) => ProviderError::Unknown(format!("HTTP {status}: {body}")),
    }
}
