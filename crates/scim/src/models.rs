//! SCIM 2.0 resource structs (RFC 7643) and protocol messages (RFC 7644).

use serde::{Deserialize, Serialize};

pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const LIST_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";
pub const PATCH_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";
pub const SPC_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig";
pub const RESOURCE_TYPE_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:ResourceType";

fn user_schemas() -> Vec<String> {
    vec![USER_SCHEMA.to_string()]
}

fn group_schemas() -> Vec<String> {
    vec![GROUP_SCHEMA.to_string()]
}

fn list_schemas() -> Vec<String> {
    vec![LIST_SCHEMA.to_string()]
}

fn error_schemas() -> Vec<String> {
    vec![ERROR_SCHEMA.to_string()]
}

fn patch_schemas() -> Vec<String> {
    vec![PATCH_SCHEMA.to_string()]
}

fn default_true() -> bool {
    true
}

fn default_email_type() -> String {
    "work".to_string()
}

fn default_member_type() -> String {
    "User".to_string()
}

/// Common `meta` attribute on every SCIM resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ScimMeta {
    pub fn new(resource_type: &str, location: String) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            location: Some(location),
            version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScimEmail {
    pub value: String,
    #[serde(rename = "type", default = "default_email_type")]
    pub email_type: String,
    #[serde(default = "default_true")]
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honorific_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honorific_suffix: Option<String>,
}

/// A group reference on a User resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScimGroupRef {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A member entry on a Group resource. `value` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScimGroupMember {
    pub value: String,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(rename = "type", default = "default_member_type")]
    pub member_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    #[serde(default = "user_schemas")]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<ScimEmail>>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<ScimGroupRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    #[serde(default = "group_schemas")]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<ScimGroupMember>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    #[serde(default = "list_schemas")]
    pub schemas: Vec<String>,
    pub total_results: i64,
    pub start_index: i64,
    pub items_per_page: i64,
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    pub fn new(total_results: i64, start_index: i64, resources: Vec<T>) -> Self {
        Self {
            schemas: list_schemas(),
            total_results,
            start_index,
            items_per_page: resources.len() as i64,
            resources,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimError {
    #[serde(default = "error_schemas")]
    pub schemas: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ScimError {
    pub fn new(status: u16, scim_type: Option<&str>, detail: String) -> Self {
        Self {
            schemas: error_schemas(),
            status: status.to_string(),
            scim_type: scim_type.map(str::to_string),
            detail: Some(detail),
        }
    }
}

/// One operation of a PATCH request (RFC 7644 §3.5.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScimPatchOp {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScimPatchRequest {
    #[serde(default = "patch_schemas")]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOp>,
}

// -- Discovery metadata (RFC 7644 §4) --

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScimFeature {
    pub supported: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimBulkConfig {
    pub supported: bool,
    pub max_operations: i64,
    pub max_payload_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimFilterConfig {
    pub supported: bool,
    pub max_results: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimAuthenticationScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub name: String,
    pub description: String,
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    pub schemas: Vec<String>,
    pub patch: ScimFeature,
    pub bulk: ScimBulkConfig,
    pub filter: ScimFilterConfig,
    pub change_password: ScimFeature,
    pub sort: ScimFeature,
    pub etag: ScimFeature,
    pub authentication_schemes: Vec<ScimAuthenticationScheme>,
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        Self {
            schemas: vec![SPC_SCHEMA.to_string()],
            patch: ScimFeature { supported: true },
            bulk: ScimBulkConfig {
                supported: false,
                max_operations: 0,
                max_payload_size: 0,
            },
            filter: ScimFilterConfig {
                supported: true,
                max_results: 200,
            },
            change_password: ScimFeature { supported: false },
            sort: ScimFeature { supported: false },
            etag: ScimFeature { supported: false },
            authentication_schemes: vec![ScimAuthenticationScheme {
                scheme_type: "httpheader".to_string(),
                name: "API Key".to_string(),
                description: "Shared secret passed in the x-api-key header".to_string(),
                primary: true,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimResourceType {
    pub schemas: Vec<String>,
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub description: String,
    #[serde(rename = "schema")]
    pub schema_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

impl ScimResourceType {
    pub fn user() -> Self {
        Self {
            schemas: vec![RESOURCE_TYPE_SCHEMA.to_string()],
            id: "User".to_string(),
            name: "User".to_string(),
            endpoint: "/scim/v2/Users".to_string(),
            description: "User Account".to_string(),
            schema_uri: USER_SCHEMA.to_string(),
            meta: Some(ScimMeta::new(
                "ResourceType",
                "/scim/v2/ResourceTypes/User".to_string(),
            )),
        }
    }

    pub fn group() -> Self {
        Self {
            schemas: vec![RESOURCE_TYPE_SCHEMA.to_string()],
            id: "Group".to_string(),
            name: "Group".to_string(),
            endpoint: "/scim/v2/Groups".to_string(),
            description: "Group".to_string(),
            schema_uri: GROUP_SCHEMA.to_string(),
            meta: Some(ScimMeta::new(
                "ResourceType",
                "/scim/v2/ResourceTypes/Group".to_string(),
            )),
        }
    }
}
