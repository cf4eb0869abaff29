//! Warden Server — HTTP entry points for bulk and cached reconciliation.
//!
//! Assembles the sync endpoints and the SCIM surface into one router behind
//! the shared-secret API-key gate. Only `/` and `/health` are public.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use warden_core::config::WardenConfig;
use warden_scim::service::ScimService;
use warden_sync::engine::SyncEngine;
use warden_sync::store::ResultStore;

pub mod api;
pub mod auth;

/// Shared application state for the sync endpoints.
pub struct AppState {
    pub config: WardenConfig,
    pub engine: Arc<SyncEngine>,
    /// Present only when object storage is enabled in configuration.
    pub store: Option<Arc<ResultStore>>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>, scim: Arc<ScimService>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/sync", post(api::sync_upload))
        .route("/sync/cached", post(api::sync_cached))
        .with_state(state.clone())
        .nest("/scim/v2", warden_scim::router::router(scim))
        .layer(middleware::from_fn_with_state(state, auth::require_api_key))
}

async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("{} is running", state.config.warden.instance_name)
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
