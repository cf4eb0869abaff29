//! Shared-secret API-key gate for mutating endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use warden_core::http::extract_client_ip;

use crate::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// Paths that bypass authentication.
const PUBLIC_PATHS: &[&str] = &["/", "/health"];

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

fn client_ip(req: &Request<Body>) -> Option<String> {
    extract_client_ip(
        req.headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok()),
    )
}

/// Require the shared-secret `x-api-key` header, compared by exact match.
/// Missing credential is unauthenticated (401); a mismatch is forbidden
/// (403).
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    if is_public_path(&path) {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match provided {
        None => {
            warn!(path, ip = ?client_ip(&req), "request missing API key");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing API key. Include 'x-api-key' header in your request."
                })),
            )
                .into_response()
        }
        Some(key) if key != state.config.server.api_secret_key => {
            warn!(path, ip = ?client_ip(&req), "request with invalid API key");
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Invalid API key" })),
            )
                .into_response()
        }
        Some(_) => next.run(req).await,
    }
}
