//! Remote directory API request/response structs.

use serde::{Deserialize, Serialize};

use warden_core::models::user::DirectoryUser;

/// Response from the token endpoint. `token_expires_at` is epoch millis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: i64,
    pub organization_id: i64,
    pub account_id: i64,
}

/// Pagination metadata on a user-list page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingInfo {
    pub offset: i64,
    pub limit: i64,
}

/// One page of directory users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPage {
    pub paging: PagingInfo,
    pub results: Vec<DirectoryUser>,
}

/// A role definition attached to a grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub can_assign_roles: Vec<String>,
}

/// A (user, scope, role) triple recorded remotely with its own id, revocable
/// independently of the user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grant {
    pub id: i64,
    pub scope: String,
    pub role: Role,
}

/// The grants held by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserGrants {
    pub user_id: i64,
    pub grants: Vec<Grant>,
}

/// Raw grants-endpoint payload, decoded once at the client boundary.
///
/// The endpoint returns a list of [`UserGrants`] normally, but some responses
/// (no grants, upstream quirks) are not a list; those decode as no grants
/// rather than an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GrantsPayload {
    Grants(Vec<UserGrants>),
    NoGrants(serde_json::Value),
}

impl GrantsPayload {
    pub fn into_grants(self) -> Vec<UserGrants> {
        match self {
            GrantsPayload::Grants(grants) => grants,
            GrantsPayload::NoGrants(_) => Vec::new(),
        }
    }
}
