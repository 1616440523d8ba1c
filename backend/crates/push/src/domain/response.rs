//! Per-recipient delivery report

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    Success,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    pub token: String,
    pub status: PushStatus,
    /// Error text for failed deliveries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl PushResponse {
    pub fn succeeded(token: impl Into<String>, data: &Map<String, Value>) -> Self {
        Self {
            token: token.into(),
            status: PushStatus::Success,
            message: None,
            data: data.clone(),
        }
    }

    pub fn failed(
        token: impl Into<String>,
        data: &Map<String, Value>,
        error: &impl fmt::Display,
    ) -> Self {
        Self {
            token: token.into(),
            status: PushStatus::Fail,
            message: Some(error.to_string()),
            data: data.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == PushStatus::Fail
    }
}
