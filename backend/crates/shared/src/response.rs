//! Response Envelope
//!
//! Every successful API body is wrapped as `{ "code", "message", "data" }`.

use serde::Serialize;

/// Default message attached to successful responses
pub const SUCCESS_MESSAGE: &str = "success";

/// Generic success envelope
///
/// ## Examples
/// ```rust
/// use kernel::response::ApiResponse;
///
/// let body = ApiResponse::ok("pong");
/// assert_eq!(body.code, 200);
/// assert_eq!(body.message, "success");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 200 with a payload
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }
}

#[cfg(feature = "axum")]
impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.code)
            .unwrap_or(axum::http::StatusCode::OK);
        (status, axum::Json(self)).into_response()
    }
}
