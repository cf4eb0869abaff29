//! SCIM 2.0 endpoints (RFC 7644), mounted under `/scim/v2` by the server.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use warden_core::error::WardenError;

use crate::models::{
    ScimError, ScimGroup, ScimPatchRequest, ScimResourceType, ScimUser, ServiceProviderConfig,
};
use crate::service::ScimService;

/// Build the SCIM sub-router. Authentication is applied by the parent
/// router's API-key gate.
pub fn router(service: Arc<ScimService>) -> Router {
    Router::new()
        .route("/ServiceProviderConfig", get(service_provider_config))
        .route("/ResourceTypes", get(resource_types))
        .route("/ResourceTypes/:id", get(resource_type))
        .route("/Users", get(list_users).post(create_user))
        .route(
            "/Users/:id",
            get(get_user)
                .put(replace_user)
                .patch(patch_user)
                .delete(delete_user),
        )
        .route("/Groups", get(list_groups))
        .route(
            "/Groups/:id",
            get(get_group).put(replace_group).patch(patch_group),
        )
        .with_state(service)
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "startIndex", default = "default_start_index")]
    start_index: i64,
    #[serde(default = "default_count")]
    count: i64,
    filter: Option<String>,
}

fn default_start_index() -> i64 {
    1
}

fn default_count() -> i64 {
    100
}

fn error_response(err: WardenError) -> Response {
    let (status, scim_type) = match &err {
        WardenError::NotFound(_) => (StatusCode::NOT_FOUND, None),
        WardenError::Conflict(_) => (StatusCode::CONFLICT, Some("uniqueness")),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    (
        status,
        Json(ScimError::new(status.as_u16(), scim_type, err.to_string())),
    )
        .into_response()
}

fn parse_user_id(id: &str) -> Result<i64, WardenError> {
    id.parse::<i64>()
        .map_err(|_| WardenError::NotFound(format!("User {id} not found")))
}

// -- Discovery --

async fn service_provider_config() -> Json<ServiceProviderConfig> {
    Json(ServiceProviderConfig::default())
}

async fn resource_types() -> Json<Vec<ScimResourceType>> {
    Json(vec![ScimResourceType::user(), ScimResourceType::group()])
}

async fn resource_type(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "User" => Json(ScimResourceType::user()).into_response(),
        "Group" => Json(ScimResourceType::group()).into_response(),
        other => error_response(WardenError::NotFound(format!(
            "ResourceType {other} not found"
        ))),
    }
}

// -- Users --

async fn list_users(
    State(service): State<Arc<ScimService>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match service
        .list_users(query.start_index, query.count, query.filter.as_deref())
        .await
    {
        Ok(list) => Json(list).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_user(State(service): State<Arc<ScimService>>, Path(id): Path<String>) -> Response {
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(e) => return error_response(e),
    };
    match service.get_user(user_id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_user(
    State(service): State<Arc<ScimService>>,
    Json(request): Json<ScimUser>,
) -> Response {
    match service.create_user(&request).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn replace_user(
    State(service): State<Arc<ScimService>>,
    Path(id): Path<String>,
    Json(request): Json<ScimUser>,
) -> Response {
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(e) => return error_response(e),
    };
    match service.replace_user(user_id, &request).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => error_response(e),
    }
}

async fn patch_user(
    State(service): State<Arc<ScimService>>,
    Path(id): Path<String>,
    Json(request): Json<ScimPatchRequest>,
) -> Response {
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(e) => return error_response(e),
    };
    match service.patch_user(user_id, &request.operations).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_user(State(service): State<Arc<ScimService>>, Path(id): Path<String>) -> Response {
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(e) => return error_response(e),
    };
    match service.delete_user(user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// -- Groups --

async fn list_groups(
    State(service): State<Arc<ScimService>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match service
        .list_groups(query.start_index, query.count, query.filter.as_deref())
        .await
    {
        Ok(list) => Json(list).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_group(State(service): State<Arc<ScimService>>, Path(id): Path<String>) -> Response {
    match service.get_group(&id).await {
        Ok(group) => Json(group).into_response(),
        Err(e) => error_response(e),
    }
}

async fn replace_group(
    State(service): State<Arc<ScimService>>,
    Path(id): Path<String>,
    Json(request): Json<ScimGroup>,
) -> Response {
    let members = request.members.unwrap_or_default();
    match service.replace_group_members(&id, &members).await {
        Ok(group) => Json(group).into_response(),
        Err(e) => error_response(e),
    }
}

async fn patch_group(
    State(service): State<Arc<ScimService>>,
    Path(id): Path<String>,
    Json(request): Json<ScimPatchRequest>,
) -> Response {
    match service.patch_group(&id, &request.operations).await {
        Ok(group) => Json(group).into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use warden_core::config::DirectoryConfig;
    use warden_core::models::mapping::GroupMappings;
    use warden_sync::client::DirectoryClient;
    use warden_sync::engine::SyncEngine;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, Router) {
        let server = MockServer::start().await;
        let config = DirectoryConfig {
            api_key: "np-key".into(),
            auth_url: "https://auth.invalid".into(),
            users_url: "https://users.invalid".into(),
            organization_id: 1,
        };
        let client = DirectoryClient::new(&config).with_base_urls(&server.uri(), &server.uri());

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "test-token",
                "refresh_token": "r",
                "token_expires_at": chrono::Utc::now().timestamp_millis() + 3_600_000,
                "organization_id": 1,
                "account_id": 1
            })))
            .mount(&server)
            .await;

        let mut mappings = GroupMappings::new();
        mappings.insert("eng", "org=1", "dev,viewer");

        let service = Arc::new(ScimService::new(
            Arc::new(SyncEngine::new(client)),
            mappings,
        ));
        (server, router(service))
    }

    async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn service_provider_config_is_public_metadata() {
        let (_server, app) = setup().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ServiceProviderConfig")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["patch"]["supported"], true);
        assert_eq!(json["bulk"]["supported"], false);
    }

    #[tokio::test]
    async fn resource_types_lists_user_and_group() {
        let (_server, app) = setup().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ResourceTypes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["id"], "User");
        assert_eq!(json[1]["id"], "Group");
    }

    #[tokio::test]
    async fn unknown_resource_type_is_404() {
        let (_server, app) = setup().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ResourceTypes/Device")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["status"], "404");
        assert!(json["schemas"][0]
            .as_str()
            .unwrap()
            .contains("api:messages:2.0:Error"));
    }

    #[tokio::test]
    async fn missing_user_returns_scim_error_body() {
        let (server, app) = setup().await;
        Mock::given(method("GET"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 0, "limit": 100},
                "results": []
            })))
            .mount(&server)
            .await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/Users/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("42"));
    }

    #[tokio::test]
    async fn non_numeric_user_id_is_404() {
        let (_server, app) = setup().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/Users/not-a-number")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_user_returns_201() {
        let (server, app) = setup().await;
        Mock::given(method("GET"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 0, "limit": 100},
                "results": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7, "email": "ann@x.com", "status": "active",
                "first_name": "Ann", "last_name": "Lee"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/authz/user_role"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let body = serde_json::json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "userName": "ann@x.com",
            "name": {"givenName": "Ann", "familyName": "Lee"}
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/Users")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["id"], "7");
        assert_eq!(json["userName"], "ann@x.com");
    }

    #[tokio::test]
    async fn delete_user_returns_204() {
        let (server, app) = setup().await;
        Mock::given(method("GET"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 0, "limit": 100},
                "results": [{"id": 7, "email": "ann@x.com", "status": "active"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/user/7"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/Users/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn list_groups_returns_mapped_groups() {
        let (server, app) = setup().await;
        Mock::given(method("GET"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 0, "limit": 100},
                "results": []
            })))
            .mount(&server)
            .await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/Groups")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["totalResults"], 1);
        assert_eq!(json["Resources"][0]["displayName"], "eng");
    }
}
