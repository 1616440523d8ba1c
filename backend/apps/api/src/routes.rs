//! Service-level routes
//!
//! `/` reports the service identity; `/aaa/v1/health-check` answers `pong`.

use axum::extract::State;
use axum::http::{HeaderValue, Method, header};
use axum::{Json, Router, routing::get};
use kernel::response::ApiResponse;
use serde::Serialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/aaa/v1";

#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    service: String,
    version: String,
    time: i64,
}

/// GET /
async fn root(State(info): State<ServiceInfo>) -> Json<RootResponse> {
    Json(RootResponse {
        service: info.service,
        version: info.version,
        time: chrono::Utc::now().timestamp(),
    })
}

/// GET /aaa/v1/health-check
async fn health_check() -> ApiResponse<&'static str> {
    ApiResponse::ok("pong")
}

/// Full application router; `users` is mounted when a user store is enabled
pub fn app_router(info: ServiceInfo, users: Option<Router>, cors_origins: &[String]) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route(&format!("{API_PREFIX}/health-check"), get(health_check))
        .with_state(info);

    if let Some(users) = users {
        router = router.nest(&format!("{API_PREFIX}/users"), users);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
        ]));

    // Credentials cannot be combined with a wildcard origin
    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    cors.allow_origin(allowed).allow_credentials(true)
}
