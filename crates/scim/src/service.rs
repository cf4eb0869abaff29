//! SCIM service layer bridging protocol operations onto the reconciliation
//! engine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use warden_core::error::{Result, WardenError};
use warden_core::models::common::UserStatus;
use warden_core::models::mapping::{GroupMapping, GroupMappings};
use warden_core::models::user::DirectoryUser;
use warden_core::names::derive_name;
use warden_sync::engine::SyncEngine;
use warden_sync::models::UserGrants;
use warden_sync::snapshot::group_grants_by_scope;

use crate::models::{
    ScimEmail, ScimGroup, ScimGroupMember, ScimGroupRef, ScimListResponse, ScimMeta, ScimName,
    ScimPatchOp, ScimUser,
};

const MAX_PAGE_SIZE: i64 = 200;

/// SCIM operations over directory users and mapped groups.
///
/// The group-mapping table is loaded once at service start and is immutable;
/// a SCIM caller can never touch a scope outside every known group mapping.
pub struct ScimService {
    engine: Arc<SyncEngine>,
    mappings: GroupMappings,
}

impl ScimService {
    pub fn new(engine: Arc<SyncEngine>, mappings: GroupMappings) -> Self {
        Self { engine, mappings }
    }

    pub fn mappings(&self) -> &GroupMappings {
        &self.mappings
    }

    fn resolved_scopes(&self, mapping: &GroupMapping) -> Vec<String> {
        mapping
            .scopes
            .iter()
            .map(|s| self.engine.resolve_scope(s))
            .collect()
    }

    async fn active_users(&self) -> Result<Vec<DirectoryUser>> {
        self.engine.client().list_all_users(Some("active")).await
    }

    async fn all_users(&self) -> Result<Vec<DirectoryUser>> {
        self.engine.client().list_all_users(None).await
    }

    fn groups_for_grants(&self, grants: &[UserGrants]) -> Vec<ScimGroupRef> {
        let by_scope = group_grants_by_scope(grants);
        let mut refs = Vec::new();
        for (group_name, mapping) in self.mappings.iter() {
            let member = self.resolved_scopes(mapping).iter().any(|scope| {
                by_scope
                    .get(scope)
                    .is_some_and(|roles| roles.keys().any(|slug| mapping.roles.contains(slug)))
            });
            if member {
                refs.push(ScimGroupRef {
                    value: group_name.clone(),
                    display: Some(group_name.clone()),
                    location: Some(format!("/scim/v2/Groups/{group_name}")),
                });
            }
        }
        refs
    }

    async fn user_to_scim(&self, user: &DirectoryUser) -> ScimUser {
        // Group refs are best-effort decoration; a grants fetch failure must
        // not fail the read.
        let groups = match self.engine.client().get_user_grants(user.id).await {
            Ok(grants) => self.groups_for_grants(&grants),
            Err(e) => {
                debug!(user_id = user.id, error = %e, "grants fetch failed while building user");
                Vec::new()
            }
        };

        let name = ScimName {
            formatted: Some(user.display_name()).filter(|s| !s.is_empty()),
            given_name: Some(user.first_name.clone()).filter(|s| !s.is_empty()),
            family_name: Some(user.last_name.clone()).filter(|s| !s.is_empty()),
            ..Default::default()
        };

        ScimUser {
            schemas: vec![crate::models::USER_SCHEMA.to_string()],
            id: Some(user.id.to_string()),
            external_id: None,
            user_name: user.email.clone(),
            name: Some(name),
            display_name: Some(user.display_name()).filter(|s| !s.is_empty()),
            emails: Some(vec![ScimEmail {
                value: user.email.clone(),
                email_type: "work".to_string(),
                primary: true,
            }]),
            active: user.status == UserStatus::Active,
            groups: (!groups.is_empty()).then_some(groups),
            meta: Some(ScimMeta::new("User", format!("/scim/v2/Users/{}", user.id))),
        }
    }

    // -- User operations --

    pub async fn get_user(&self, user_id: i64) -> Result<ScimUser> {
        let users = self.active_users().await?;
        let user = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| WardenError::NotFound(format!("User {user_id} not found")))?;
        Ok(self.user_to_scim(user).await)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<ScimUser>> {
        let users = self.all_users().await?;
        let needle = username.to_lowercase();
        match users.iter().find(|u| u.email_key() == needle) {
            Some(user) => Ok(Some(self.user_to_scim(user).await)),
            None => Ok(None),
        }
    }

    pub async fn list_users(
        &self,
        start_index: i64,
        count: i64,
        filter: Option<&str>,
    ) -> Result<ScimListResponse<ScimUser>> {
        let mut users = self.active_users().await?;

        if let Some(email) = filter.and_then(|f| filter_value(f, "userName")) {
            let needle = email.to_lowercase();
            users.retain(|u| u.email_key() == needle);
        }

        let total = users.len() as i64;
        let mut resources = Vec::new();
        for user in paginate(&users, start_index, count) {
            resources.push(self.user_to_scim(user).await);
        }

        Ok(ScimListResponse::new(total, start_index.max(1), resources))
    }

    /// Create a directory user and apply each referenced known group mapping
    /// through the engine's grant-diff primitive. An existing userName is a
    /// conflict.
    pub async fn create_user(&self, request: &ScimUser) -> Result<ScimUser> {
        let email = request
            .emails
            .as_ref()
            .and_then(|emails| emails.first())
            .map(|e| e.value.clone())
            .unwrap_or_else(|| request.user_name.clone());

        if self.get_user_by_username(&email).await?.is_some() {
            return Err(WardenError::Conflict(format!(
                "User with userName {email} already exists"
            )));
        }

        let (first, last) = match &request.name {
            Some(name) if name.given_name.is_some() => (
                name.given_name.clone().unwrap_or_default(),
                name.family_name.clone().unwrap_or_default(),
            ),
            _ => derive_name(request.display_name.as_deref().unwrap_or(""), &email),
        };

        let created = self.engine.client().create_user(&email, &first, &last).await?;
        info!(email, id = created.id, "created user via SCIM");

        let mut logs = Vec::new();
        if let Some(groups) = &request.groups {
            for group_ref in groups {
                let Some(mapping) = self.mappings.get(&group_ref.value) else {
                    warn!(group = %group_ref.value, "SCIM create references unknown group");
                    continue;
                };
                for scope in &mapping.scopes {
                    self.engine
                        .replace_scope_roles(
                            created.id,
                            &created.email,
                            scope,
                            &mapping.roles,
                            false,
                            &mut logs,
                        )
                        .await?;
                }
            }
        }
        for line in &logs {
            info!("{line}");
        }

        Ok(self.user_to_scim(&created).await)
    }

    /// Full replacement (PUT). `active: false` deactivates. When `groups` is
    /// present, changes are confined to the mapped scope universe: every
    /// scope named by any known mapping gets the union of roles contributed
    /// by the referenced groups, or the empty set when none reference it.
    pub async fn replace_user(&self, user_id: i64, request: &ScimUser) -> Result<ScimUser> {
        let users = self.active_users().await?;
        let user = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| WardenError::NotFound(format!("User {user_id} not found")))?
            .clone();

        if !request.active {
            self.engine
                .client()
                .set_user_status(user.id, UserStatus::Inactive)
                .await?;
            info!(user_id, "deactivated user via SCIM replace");
            return Ok(self.user_to_scim(&user).await);
        }

        if let Some(groups) = &request.groups {
            let mut desired: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for (_, mapping) in self.mappings.iter() {
                for scope in self.resolved_scopes(mapping) {
                    desired.entry(scope).or_default();
                }
            }
            for group_ref in groups {
                let Some(mapping) = self.mappings.get(&group_ref.value) else {
                    warn!(group = %group_ref.value, "SCIM replace references unknown group");
                    continue;
                };
                for scope in self.resolved_scopes(mapping) {
                    desired
                        .entry(scope)
                        .or_default()
                        .extend(mapping.roles.iter().cloned());
                }
            }

            let grants = self.engine.client().get_user_grants(user.id).await?;
            let current_by_scope = group_grants_by_scope(&grants);
            let empty = BTreeMap::new();

            let mut logs = Vec::new();
            for (scope, roles) in &desired {
                let current = current_by_scope.get(scope).unwrap_or(&empty);
                self.engine
                    .apply_scope_roles(user.id, &user.email, scope, current, roles, false, &mut logs)
                    .await;
            }
            for line in &logs {
                info!("{line}");
            }
        }

        Ok(self.user_to_scim(&user).await)
    }

    /// Partial update (PATCH). Supports `replace` on path `active`:
    /// `false` deactivates, `true` reactivates.
    pub async fn patch_user(&self, user_id: i64, operations: &[ScimPatchOp]) -> Result<ScimUser> {
        let users = self.all_users().await?;
        let user = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| WardenError::NotFound(format!("User {user_id} not found")))?
            .clone();

        for op in operations {
            if !op.op.eq_ignore_ascii_case("replace") || op.path.as_deref() != Some("active") {
                continue;
            }
            match op.value.as_ref().and_then(value_as_bool) {
                Some(false) => {
                    self.engine
                        .client()
                        .set_user_status(user.id, UserStatus::Inactive)
                        .await?;
                    info!(user_id, "deactivated user via SCIM patch");
                }
                Some(true) => {
                    self.engine
                        .client()
                        .set_user_status(user.id, UserStatus::Active)
                        .await?;
                    info!(user_id, "reactivated user via SCIM patch");
                }
                None => {}
            }
        }

        Ok(self.user_to_scim(&user).await)
    }

    /// Deactivate a user (SCIM delete is a status flip, never a record
    /// deletion).
    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        let users = self.active_users().await?;
        let user = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| WardenError::NotFound(format!("User {user_id} not found")))?;

        self.engine
            .client()
            .set_user_status(user.id, UserStatus::Inactive)
            .await?;
        info!(user_id, "deactivated user via SCIM delete");
        Ok(())
    }

    // -- Group operations --

    /// Read a group. Membership is computed by scanning active users' grants
    /// against the mapping's scopes and role-set; it is never stored.
    pub async fn get_group(&self, group_id: &str) -> Result<ScimGroup> {
        let mapping = self
            .mappings
            .get(group_id)
            .ok_or_else(|| WardenError::NotFound(format!("Group {group_id} not found")))?;
        let scopes = self.resolved_scopes(mapping);

        let mut members = Vec::new();
        for user in self.active_users().await? {
            let grants = match self.engine.client().get_user_grants(user.id).await {
                Ok(grants) => grants,
                Err(e) => {
                    debug!(user_id = user.id, error = %e, "grants fetch failed during group scan");
                    continue;
                }
            };
            let by_scope = group_grants_by_scope(&grants);
            let member = scopes.iter().any(|scope| {
                by_scope
                    .get(scope)
                    .is_some_and(|roles| roles.keys().any(|slug| mapping.roles.contains(slug)))
            });
            if member {
                members.push(ScimGroupMember {
                    value: user.id.to_string(),
                    location: Some(format!("/scim/v2/Users/{}", user.id)),
                    display: Some(user.email.clone()),
                    member_type: "User".to_string(),
                });
            }
        }

        Ok(ScimGroup {
            schemas: vec![crate::models::GROUP_SCHEMA.to_string()],
            id: Some(group_id.to_string()),
            display_name: group_id.to_string(),
            external_id: None,
            members: (!members.is_empty()).then_some(members),
            meta: Some(ScimMeta::new("Group", format!("/scim/v2/Groups/{group_id}"))),
        })
    }

    pub async fn list_groups(
        &self,
        start_index: i64,
        count: i64,
        filter: Option<&str>,
    ) -> Result<ScimListResponse<ScimGroup>> {
        let mut names: Vec<String> = self.mappings.group_names().cloned().collect();

        if let Some(display_name) = filter.and_then(|f| filter_value(f, "displayName")) {
            names.retain(|n| *n == display_name);
        }

        let total = names.len() as i64;
        let mut resources = Vec::new();
        for name in paginate(&names, start_index, count) {
            resources.push(self.get_group(name).await?);
        }

        Ok(ScimListResponse::new(total, start_index.max(1), resources))
    }

    /// Full replacement (PUT): apply the group's mapped role-set to every
    /// listed member. Members not listed are left untouched; removal is the
    /// PATCH `remove` operation's job.
    pub async fn replace_group_members(
        &self,
        group_id: &str,
        members: &[ScimGroupMember],
    ) -> Result<ScimGroup> {
        let mapping = self
            .mappings
            .get(group_id)
            .ok_or_else(|| WardenError::NotFound(format!("Group {group_id} not found")))?
            .clone();

        let mut logs = Vec::new();
        for member in members {
            let Ok(user_id) = member.value.parse::<i64>() else {
                warn!(value = %member.value, "ignoring group member with non-numeric id");
                continue;
            };
            self.apply_group_roles(user_id, &member.value, &mapping, &mapping.roles, &mut logs)
                .await?;
        }
        for line in &logs {
            info!("{line}");
        }

        self.get_group(group_id).await
    }

    /// PATCH: `add` on `members` applies the group's role-set for each member
    /// value; `remove` on `members[value eq "<id>"]` applies the empty set.
    pub async fn patch_group(
        &self,
        group_id: &str,
        operations: &[ScimPatchOp],
    ) -> Result<ScimGroup> {
        let mapping = self
            .mappings
            .get(group_id)
            .ok_or_else(|| WardenError::NotFound(format!("Group {group_id} not found")))?
            .clone();

        let mut logs = Vec::new();
        for op in operations {
            let op_kind = op.op.to_lowercase();
            let path = op.path.as_deref().unwrap_or_default();

            if op_kind == "add" && path == "members" {
                for value in member_values(op.value.as_ref()) {
                    let Ok(user_id) = value.parse::<i64>() else {
                        warn!(%value, "ignoring group member with non-numeric id");
                        continue;
                    };
                    self.apply_group_roles(user_id, &value, &mapping, &mapping.roles, &mut logs)
                        .await?;
                }
            } else if op_kind == "remove" && path.contains("members") {
                let Some(value) = path_filter_value(path) else {
                    continue;
                };
                let Ok(user_id) = value.parse::<i64>() else {
                    warn!(%value, "ignoring group member with non-numeric id");
                    continue;
                };
                self.apply_group_roles(user_id, &value, &mapping, &BTreeSet::new(), &mut logs)
                    .await?;
            }
        }
        for line in &logs {
            info!("{line}");
        }

        self.get_group(group_id).await
    }

    async fn apply_group_roles(
        &self,
        user_id: i64,
        label: &str,
        mapping: &GroupMapping,
        roles: &BTreeSet<String>,
        logs: &mut Vec<String>,
    ) -> Result<()> {
        for scope in &mapping.scopes {
            self.engine
                .replace_scope_roles(user_id, label, scope, roles, false, logs)
                .await?;
        }
        Ok(())
    }
}

/// Extract the quoted value of a simple equality filter like
/// `userName eq "ann@x.com"`.
fn filter_value(filter: &str, attribute: &str) -> Option<String> {
    if !filter.contains(&format!("{attribute} eq")) {
        return None;
    }
    filter.split('"').nth(1).map(str::to_string)
}

/// Extract the quoted value from a patch path like `members[value eq "7"]`.
fn path_filter_value(path: &str) -> Option<String> {
    if !path.contains("[value eq") {
        return None;
    }
    path.split('"').nth(1).map(str::to_string)
}

fn value_as_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => match s.to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Collect `value` fields from a patch member payload (a list of member
/// objects, or a single one).
fn member_values(value: Option<&serde_json::Value>) -> Vec<String> {
    let items: Vec<&serde_json::Value> = match value {
        Some(serde_json::Value::Array(items)) => items.iter().collect(),
        Some(single @ serde_json::Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| item.get("value"))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// 1-based SCIM pagination with the count clamped to `1..=200`.
fn paginate<T>(items: &[T], start_index: i64, count: i64) -> &[T] {
    let start = (start_index.max(1) - 1) as usize;
    let count = count.clamp(1, MAX_PAGE_SIZE) as usize;
    if start >= items.len() {
        return &[];
    }
    let end = (start + count).min(items.len());
    &items[start..end]
}
