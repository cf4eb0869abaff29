//! Typed reqwest wrapper for the remote directory/authorization service.

use std::sync::Mutex;

use chrono::Utc;
use warden_core::config::DirectoryConfig;
use warden_core::error::{Result, WardenError};
use warden_core::models::common::UserStatus;
use warden_core::models::user::DirectoryUser;

use crate::models::{GrantsPayload, TokenResponse, UserGrants, UserPage};

/// Refresh the bearer token when within this many millis of expiry.
const TOKEN_REFRESH_WINDOW_MS: i64 = 60_000;

/// Page size for the offset/limit user listing loop.
const PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at_ms: i64,
}

/// HTTP client for directory user and grant operations.
///
/// Owns the bearer-token lifecycle: the token is fetched lazily, cached, and
/// refreshed when within 60 seconds of expiry. The cache is swapped whole
/// under a mutex never held across an await; a racing refresh costs at most
/// one extra token call.
pub struct DirectoryClient {
    http: reqwest::Client,
    auth_url: String,
    users_url: String,
    api_key: String,
    organization_id: i64,
    token: Mutex<Option<CachedToken>>,
}

impl DirectoryClient {
    /// Create a new client from the directory section of the configuration.
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            users_url: config.users_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            organization_id: config.organization_id,
            token: Mutex::new(None),
        }
    }

    /// Override both base URLs (for testing with wiremock).
    pub fn with_base_urls(mut self, auth_url: &str, users_url: &str) -> Self {
        self.auth_url = auth_url.trim_end_matches('/').to_string();
        self.users_url = users_url.trim_end_matches('/').to_string();
        self
    }

    pub fn organization_id(&self) -> i64 {
        self.organization_id
    }

    /// The organization-root scope, used to resolve `"*"` wildcards.
    pub fn root_scope(&self) -> String {
        format!("organization={}", self.organization_id)
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().expect("token mutex poisoned");
        let cached = guard.as_ref()?;
        let now_ms = Utc::now().timestamp_millis();
        if now_ms >= cached.expires_at_ms - TOKEN_REFRESH_WINDOW_MS {
            return None;
        }
        Some(cached.access_token.clone())
    }

    /// Return a valid bearer token, fetching a fresh one if the cached token
    /// is missing or about to expire. Token failures are fatal auth errors.
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let resp = self
            .http
            .post(format!("{}/token", self.auth_url))
            .json(&serde_json::json!({ "api_key": self.api_key }))
            .send()
            .await
            .map_err(|e| WardenError::Auth(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::Auth(format!(
                "token request failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| WardenError::Auth(format!("token parse failed: {e}")))?;

        let mut guard = self.token.lock().expect("token mutex poisoned");
        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at_ms: token.token_expires_at,
        });
        Ok(token.access_token)
    }

    /// List one page of directory users. Status `None` fetches users of any
    /// status.
    pub async fn list_users(
        &self,
        offset: i64,
        limit: i64,
        status: Option<&str>,
    ) -> Result<UserPage> {
        let token = self.get_token().await?;
        let mut req = self
            .http
            .get(format!("{}/user/", self.users_url))
            .bearer_auth(&token)
            .query(&[
                ("type", "person".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("organization_id", self.organization_id.to_string()),
            ]);

        if let Some(status) = status {
            req = req.query(&[("status", status)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("list users request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::RemoteCall(format!(
                "list users failed ({status}): {body}"
            )));
        }

        resp.json::<UserPage>()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("list users parse failed: {e}")))
    }

    /// List every directory user, paging until a page returns fewer rows than
    /// requested.
    pub async fn list_all_users(&self, status: Option<&str>) -> Result<Vec<DirectoryUser>> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_users(offset, PAGE_SIZE, status).await?;
            let count = page.results.len() as i64;
            all.extend(page.results);

            if count < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(all)
    }

    /// Create a directory user; the remote service assigns the id.
    pub async fn create_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<DirectoryUser> {
        let token = self.get_token().await?;
        let payload = serde_json::json!({
            "email": email,
            "first_name": first_name,
            "last_name": last_name,
            "organization_id": self.organization_id,
        });

        let resp = self
            .http
            .post(format!("{}/user/", self.users_url))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("create user request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::RemoteCall(format!(
                "create user failed ({status}): {body}"
            )));
        }

        resp.json::<DirectoryUser>()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("create user parse failed: {e}")))
    }

    /// Flip a user's status (deactivate/reactivate). Never deletes the record.
    pub async fn set_user_status(&self, user_id: i64, status: UserStatus) -> Result<()> {
        let token = self.get_token().await?;
        let resp = self
            .http
            .patch(format!("{}/user/{user_id}", self.users_url))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "status": status.as_str() }))
            .send()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("set status request failed: {e}")))?;

        if !resp.status().is_success() {
            let status_code = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::RemoteCall(format!(
                "set status failed ({status_code}): {body}"
            )));
        }

        Ok(())
    }

    /// Fetch a user's grants under the organization-root scope. A non-list
    /// payload decodes as no grants rather than an error.
    pub async fn get_user_grants(&self, user_id: i64) -> Result<Vec<UserGrants>> {
        let token = self.get_token().await?;
        let resp = self
            .http
            .get(format!("{}/authz/user_role", self.auth_url))
            .bearer_auth(&token)
            .query(&[
                ("user_id", user_id.to_string()),
                ("scope", self.root_scope()),
            ])
            .send()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("get grants request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::RemoteCall(format!(
                "get grants failed ({status}): {body}"
            )));
        }

        let payload: GrantsPayload = resp
            .json()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("get grants parse failed: {e}")))?;
        Ok(payload.into_grants())
    }

    /// Grant a role to a user within a scope.
    pub async fn create_grant(&self, user_id: i64, role_slug: &str, scope: &str) -> Result<()> {
        let token = self.get_token().await?;
        let payload = serde_json::json!({
            "role_slug": role_slug,
            "user_id": user_id,
            "scope": scope,
        });

        let resp = self
            .http
            .post(format!("{}/authz/grants", self.auth_url))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("create grant request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::RemoteCall(format!(
                "create grant failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    /// Revoke a grant by its remote id.
    pub async fn delete_grant(&self, grant_id: i64) -> Result<()> {
        let token = self.get_token().await?;
        let resp = self
            .http
            .delete(format!("{}/authz/grants/{grant_id}", self.auth_url))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| WardenError::RemoteCall(format!("delete grant request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WardenError::RemoteCall(format!(
                "delete grant failed ({status}): {body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            api_key: "np-key".into(),
            auth_url: "https://auth.invalid".into(),
            users_url: "https://users.invalid".into(),
            organization_id: 1,
        }
    }

    fn token_body(expires_in_ms: i64) -> serde_json::Value {
        serde_json::json!({
            "access_token": "test-token",
            "refresh_token": "refresh",
            "token_expires_at": Utc::now().timestamp_millis() + expires_in_ms,
            "organization_id": 1,
            "account_id": 1
        })
    }

    async fn setup() -> (MockServer, DirectoryClient) {
        let server = MockServer::start().await;
        let client = DirectoryClient::new(&config()).with_base_urls(&server.uri(), &server.uri());

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_json(serde_json::json!({ "api_key": "np-key" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3_600_000)))
            .mount(&server)
            .await;

        (server, client)
    }

    #[tokio::test]
    async fn token_is_cached_across_calls() {
        let server = MockServer::start().await;
        let client = DirectoryClient::new(&config()).with_base_urls(&server.uri(), &server.uri());

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3_600_000)))
            .expect(1)
            .mount(&server)
            .await;

        let first = client.get_token().await.unwrap();
        let second = client.get_token().await.unwrap();
        assert_eq!(first, "test-token");
        assert_eq!(second, "test-token");
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed() {
        let server = MockServer::start().await;
        let client = DirectoryClient::new(&config()).with_base_urls(&server.uri(), &server.uri());

        // Expiry inside the 60s refresh window, so the second call refreshes.
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(30_000)))
            .expect(2)
            .mount(&server)
            .await;

        client.get_token().await.unwrap();
        client.get_token().await.unwrap();
    }

    #[tokio::test]
    async fn token_failure_is_auth_error() {
        let server = MockServer::start().await;
        let client = DirectoryClient::new(&config()).with_base_urls(&server.uri(), &server.uri());

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client.get_token().await.unwrap_err();
        assert!(matches!(err, WardenError::Auth(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn list_users_sends_pagination_params() {
        let (server, client) = setup().await;

        let body = serde_json::json!({
            "paging": {"offset": 0, "limit": 100},
            "results": [
                {"id": 1, "email": "a@x.com", "status": "active"},
                {"id": 2, "email": "b@x.com", "status": "inactive"}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/user/"))
            .and(query_param("type", "person"))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "100"))
            .and(query_param("organization_id", "1"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let page = client.list_users(0, 100, None).await.unwrap();
        assert_eq!(page.results.len(), 2);
    }

    #[tokio::test]
    async fn list_all_users_stops_on_short_page() {
        let (server, client) = setup().await;

        let body = serde_json::json!({
            "paging": {"offset": 0, "limit": 100},
            "results": [{"id": 1, "email": "a@x.com", "status": "active"}]
        });

        Mock::given(method("GET"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&server)
            .await;

        let users = client.list_all_users(None).await.unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn list_all_users_follows_full_pages() {
        let (server, client) = setup().await;

        let full: Vec<serde_json::Value> = (0..100)
            .map(|i| {
                serde_json::json!({"id": i, "email": format!("u{i}@x.com"), "status": "active"})
            })
            .collect();

        Mock::given(method("GET"))
            .and(path("/user/"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 0, "limit": 100},
                "results": full
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/user/"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 100, "limit": 100},
                "results": [{"id": 100, "email": "last@x.com", "status": "active"}]
            })))
            .mount(&server)
            .await;

        let users = client.list_all_users(None).await.unwrap();
        assert_eq!(users.len(), 101);
        assert_eq!(users.last().unwrap().email, "last@x.com");
    }

    #[tokio::test]
    async fn list_users_passes_status_filter() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/user/"))
            .and(query_param("status", "active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"offset": 0, "limit": 100},
                "results": []
            })))
            .mount(&server)
            .await;

        let page = client.list_users(0, 100, Some("active")).await.unwrap();
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn create_user_returns_created_record() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/user/"))
            .and(body_json(serde_json::json!({
                "email": "ann@x.com",
                "first_name": "Ann",
                "last_name": "Lee",
                "organization_id": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7, "email": "ann@x.com", "status": "active",
                "first_name": "Ann", "last_name": "Lee", "organization_id": 1
            })))
            .mount(&server)
            .await;

        let user = client.create_user("ann@x.com", "Ann", "Lee").await.unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn create_user_conflict_is_remote_call_error() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already exists"))
            .mount(&server)
            .await;

        let err = client.create_user("dup@x.com", "D", "U").await.unwrap_err();
        assert!(matches!(err, WardenError::RemoteCall(_)));
        assert!(err.to_string().contains("409"));
    }

    #[tokio::test]
    async fn set_user_status_patches_record() {
        let (server, client) = setup().await;

        Mock::given(method("PATCH"))
            .and(path("/user/7"))
            .and(body_json(serde_json::json!({ "status": "inactive" })))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        client.set_user_status(7, UserStatus::Inactive).await.unwrap();
    }

    #[tokio::test]
    async fn get_user_grants_groups_by_scope_param() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/authz/user_role"))
            .and(query_param("user_id", "7"))
            .and(query_param("scope", "organization=1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"user_id": 7, "grants": [
                    {"id": 20, "scope": "org=1", "role": {"id": 1, "name": "Dev", "slug": "dev"}}
                ]}
            ])))
            .mount(&server)
            .await;

        let grants = client.get_user_grants(7).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].grants[0].id, 20);
    }

    #[tokio::test]
    async fn get_user_grants_non_list_payload_is_empty() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/authz/user_role"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "no roles"})),
            )
            .mount(&server)
            .await;

        let grants = client.get_user_grants(7).await.unwrap();
        assert!(grants.is_empty());
    }

    #[tokio::test]
    async fn create_grant_posts_payload() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/authz/grants"))
            .and(body_json(serde_json::json!({
                "role_slug": "dev",
                "user_id": 7,
                "scope": "org=1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 99})))
            .mount(&server)
            .await;

        client.create_grant(7, "dev", "org=1").await.unwrap();
    }

    #[tokio::test]
    async fn delete_grant_targets_grant_id() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/authz/grants/99"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        client.delete_grant(99).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_remote_call_error() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/user/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = client.list_users(0, 100, None).await.unwrap_err();
        assert!(matches!(err, WardenError::RemoteCall(_)));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn root_scope_uses_organization_id() {
        let client = DirectoryClient::new(&config());
        assert_eq!(client.root_scope(), "organization=1");
    }
}
