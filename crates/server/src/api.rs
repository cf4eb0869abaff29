//! Bulk and cached sync endpoints.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use warden_core::error::WardenError;
use warden_sync::hash::input_fingerprint;

use crate::AppState;

#[derive(Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
}

fn error_response(err: WardenError) -> Response {
    let status = match &err {
        WardenError::MalformedInput { .. } => StatusCode::BAD_REQUEST,
        WardenError::Auth(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// `POST /sync` — run one reconciliation from an uploaded roster and mapping
/// file.
pub async fn sync_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
    mut multipart: Multipart,
) -> Response {
    let mut roster: Option<Vec<u8>> = None;
    let mut mapping: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("invalid multipart body: {e}")),
        };
        let name = field.name().unwrap_or_default().to_string();
        let data = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return bad_request(format!("failed to read field '{name}': {e}")),
        };
        match name.as_str() {
            "roster_file" => roster = Some(data),
            "mapping_file" => mapping = Some(data),
            _ => {}
        }
    }

    let (Some(roster), Some(mapping)) = (roster, mapping) else {
        return bad_request("both 'roster_file' and 'mapping_file' are required".into());
    };

    match state
        .engine
        .execute_sync(&roster, &mapping, query.dry_run, query.force)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

/// `POST /sync/cached` — run a reconciliation from the object-store inputs,
/// replaying the stored result when the input bytes are unchanged.
///
/// `force=true` bypasses the cache lookup but still stores the fresh result.
/// Dry runs neither consult nor populate the cache.
pub async fn sync_cached(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
) -> Response {
    let Some(store) = &state.store else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "object storage is not configured" })),
        )
            .into_response();
    };

    let (roster, mapping) = match store.fetch_inputs().await {
        Ok(inputs) => inputs,
        Err(e) => return error_response(e),
    };
    let hash = input_fingerprint(&roster, &mapping);

    if !query.force && !query.dry_run {
        match store.get_result(&hash).await {
            Ok(Some(cached)) => {
                info!(hash, "returning cached sync result");
                return Json(cached).into_response();
            }
            Ok(None) => {}
            Err(e) => return error_response(e),
        }
    }

    let result = match state
        .engine
        .execute_sync(&roster, &mapping, query.dry_run, query.force)
        .await
    {
        Ok(result) => result,
        Err(e) => return error_response(e),
    };

    if !query.dry_run {
        match store.put_result(&hash, &result).await {
            Ok(key) => info!(key, "stored sync result"),
            Err(e) => warn!(hash, error = %e, "failed to store sync result"),
        }
    }

    Json(result).into_response()
}
