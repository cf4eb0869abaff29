//! Reconciliation engine: diffs desired vs. actual state and executes the
//! minimal set of create/reactivate/deactivate/grant/revoke operations.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use warden_core::error::Result;
use warden_core::models::common::UserStatus;
use warden_core::models::sync::SyncResult;
use warden_core::names::derive_name;
use warden_core::roster::desired::{DesiredState, DesiredUser};
use warden_core::roster::rows::{parse_mappings, parse_roster};

use crate::client::DirectoryClient;
use crate::snapshot::{group_grants_by_scope, ActualState};

/// Drives remote mutations from a desired/actual state diff.
///
/// All remote calls are issued sequentially: the remote directory is the
/// shared mutable state, and concurrent grant mutations for one user risk
/// lost updates. Safety under concurrent identical runs comes from the
/// never-re-grant rule in [`SyncEngine::apply_scope_roles`].
pub struct SyncEngine {
    client: DirectoryClient,
}

impl SyncEngine {
    pub fn new(client: DirectoryClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DirectoryClient {
        &self.client
    }

    /// Resolve a mapping scope for comparison. The `"*"` wildcard means the
    /// organization-root scope; everything else passes through.
    pub fn resolve_scope(&self, scope: &str) -> String {
        if scope.trim() == "*" {
            self.client.root_scope()
        } else {
            scope.to_string()
        }
    }

    fn resolve_desired_scopes(&self, user: &DesiredUser) -> BTreeMap<String, BTreeSet<String>> {
        let mut resolved: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (scope, roles) in &user.scopes {
            resolved
                .entry(self.resolve_scope(scope))
                .or_default()
                .extend(roles.iter().cloned());
        }
        resolved
    }

    /// Make one user's role-set within one (already resolved) scope match
    /// `desired`: revoke roles in `current − desired`, grant roles in
    /// `desired − current`. Roles already held are never re-granted, so an
    /// unchanged rerun issues zero mutations.
    ///
    /// This is the single grant-diff primitive shared by the bulk CSV path
    /// and the SCIM adapter. Individual grant failures are logged and do not
    /// abort the run. Returns whether any change was made (or, in dry-run,
    /// would have been made).
    pub async fn apply_scope_roles(
        &self,
        user_id: i64,
        email: &str,
        scope: &str,
        current: &BTreeMap<String, i64>,
        desired: &BTreeSet<String>,
        dry_run: bool,
        logs: &mut Vec<String>,
    ) -> bool {
        let current_roles: BTreeSet<String> = current.keys().cloned().collect();
        if current_roles == *desired {
            logs.push(format!(
                "Roles for {email} in scope '{scope}' match; no update needed."
            ));
            return false;
        }

        if dry_run {
            logs.push(format!(
                "[DRY RUN] Would update roles for {email} in scope '{scope}' from {current_roles:?} to {desired:?}."
            ));
            return true;
        }

        let mut changed = false;

        for (slug, grant_id) in current {
            if desired.contains(slug) {
                continue;
            }
            match self.client.delete_grant(*grant_id).await {
                Ok(()) => changed = true,
                Err(e) => {
                    warn!(email, scope, slug, error = %e, "grant revocation failed");
                    logs.push(format!(
                        "Error revoking role '{slug}' (grant {grant_id}) for {email}: {e}"
                    ));
                }
            }
        }

        for slug in desired {
            if current.contains_key(slug) {
                continue;
            }
            match self.client.create_grant(user_id, slug, scope).await {
                Ok(()) => changed = true,
                Err(e) => {
                    warn!(email, scope, slug, error = %e, "grant creation failed");
                    logs.push(format!(
                        "Error granting role '{slug}' in scope '{scope}' for {email}: {e}"
                    ));
                }
            }
        }

        if changed {
            logs.push(format!(
                "Updated roles for {email} in scope '{scope}' from {current_roles:?} to {desired:?}."
            ));
        }

        changed
    }

    /// Fetch a user's grants and apply [`SyncEngine::apply_scope_roles`] for
    /// a single scope. Used by the SCIM adapter for per-entity changes.
    pub async fn replace_scope_roles(
        &self,
        user_id: i64,
        email: &str,
        scope: &str,
        desired: &BTreeSet<String>,
        dry_run: bool,
        logs: &mut Vec<String>,
    ) -> Result<bool> {
        let resolved = self.resolve_scope(scope);
        let grants = self.client.get_user_grants(user_id).await?;
        let by_scope = group_grants_by_scope(&grants);
        let empty = BTreeMap::new();
        let current = by_scope.get(&resolved).unwrap_or(&empty);
        Ok(self
            .apply_scope_roles(user_id, email, &resolved, current, desired, dry_run, logs)
            .await)
    }

    /// Reconcile desired state against the actual snapshot.
    ///
    /// First pass deactivates active users absent from desired state. Second
    /// pass, per desired user in arbitrary cross-user order: create or
    /// reactivate as needed, then diff grants per scope. A reactivation
    /// counts as a creation in the tally. The run's status stays "success"
    /// even with embedded per-item failures; callers inspect the logs.
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
        actual: &ActualState,
        dry_run: bool,
        mut logs: Vec<String>,
    ) -> SyncResult {
        let mut users_processed = 0i64;
        let mut users_created = 0i64;
        let mut users_updated = 0i64;
        let mut users_deleted = 0i64;

        info!(
            desired = desired.len(),
            actual = actual.len(),
            dry_run,
            "starting reconciliation"
        );

        // Pass 1: deactivate active users that are no longer desired. Their
        // grants are left in place; see the grant diff below, which only
        // runs for users still present in desired state.
        for user in actual.users() {
            if desired.contains(&user.email_key()) {
                continue;
            }
            match user.status {
                UserStatus::Active => {
                    if dry_run {
                        logs.push(format!(
                            "[DRY RUN] Would mark user {} as inactive (absent from roster).",
                            user.email
                        ));
                        users_deleted += 1;
                    } else {
                        match self.client.set_user_status(user.id, UserStatus::Inactive).await {
                            Ok(()) => {
                                logs.push(format!(
                                    "User {} absent from roster; marked inactive.",
                                    user.email
                                ));
                                users_deleted += 1;
                            }
                            Err(e) => {
                                warn!(email = %user.email, error = %e, "deactivation failed");
                                logs.push(format!(
                                    "Error deactivating user {}: {e}",
                                    user.email
                                ));
                            }
                        }
                    }
                }
                UserStatus::Inactive => {
                    logs.push(format!(
                        "User {} already inactive; no action.",
                        user.email
                    ));
                }
            }
        }

        // Pass 2: per desired user — create/reactivate, then diff grants.
        for (email, want) in desired.iter() {
            users_processed += 1;

            let existing = actual.get(email);
            let mut created_now = false;
            let mut user_id = existing.map(|u| u.id);

            match existing {
                None => {
                    if dry_run {
                        logs.push(format!("[DRY RUN] Would create user {email}."));
                        users_created += 1;
                        created_now = true;
                    } else {
                        let (first, last) = derive_name(&want.username, email);
                        match self.client.create_user(email, &first, &last).await {
                            Ok(created) => {
                                logs.push(format!(
                                    "Created user {email} with id {}.",
                                    created.id
                                ));
                                users_created += 1;
                                created_now = true;
                                user_id = Some(created.id);
                            }
                            Err(e) => {
                                warn!(email, error = %e, "user creation failed");
                                logs.push(format!("Error creating user {email}: {e}"));
                                continue;
                            }
                        }
                    }
                }
                Some(user) if user.status == UserStatus::Inactive => {
                    if dry_run {
                        logs.push(format!("[DRY RUN] Would reactivate user {}.", user.email));
                        users_created += 1;
                        created_now = true;
                    } else {
                        match self.client.set_user_status(user.id, UserStatus::Active).await {
                            Ok(()) => {
                                logs.push(format!("Reactivated user {}.", user.email));
                                // A reactivation is indistinguishable from a
                                // creation in the result tally.
                                users_created += 1;
                                created_now = true;
                            }
                            Err(e) => {
                                warn!(email = %user.email, error = %e, "reactivation failed");
                                logs.push(format!(
                                    "Error reactivating user {}: {e}",
                                    user.email
                                ));
                                continue;
                            }
                        }
                    }
                }
                Some(_) => {}
            }

            let targets = self.resolve_desired_scopes(want);

            // A brand-new user holds no grants; skip the fetch. Pre-existing
            // users (including reactivated ones) are fetched, in dry-run too,
            // so dry-run counts match a live run.
            let current_by_scope = match (user_id, existing.is_some()) {
                (Some(id), true) => match self.client.get_user_grants(id).await {
                    Ok(grants) => group_grants_by_scope(&grants),
                    Err(e) => {
                        warn!(email, error = %e, "grant fetch failed");
                        logs.push(format!("Error fetching grants for user {email}: {e}"));
                        continue;
                    }
                },
                _ => BTreeMap::new(),
            };

            let apply_id = user_id.unwrap_or_default();
            let mut changed = false;

            for (scope, current) in &current_by_scope {
                if targets.contains_key(scope) {
                    continue;
                }
                changed |= self
                    .apply_scope_roles(
                        apply_id,
                        email,
                        scope,
                        current,
                        &BTreeSet::new(),
                        dry_run,
                        &mut logs,
                    )
                    .await;
            }

            for (scope, roles) in &targets {
                let empty = BTreeMap::new();
                let current = current_by_scope.get(scope).unwrap_or(&empty);
                changed |= self
                    .apply_scope_roles(apply_id, email, scope, current, roles, dry_run, &mut logs)
                    .await;
            }

            if changed && !created_now {
                users_updated += 1;
            }
        }

        logs.push("Synchronization completed.".to_string());

        info!(
            users_processed,
            users_created, users_updated, users_deleted, dry_run, "reconciliation finished"
        );

        SyncResult::success(
            users_processed,
            users_created,
            users_updated,
            users_deleted,
            logs,
        )
    }

    /// Run one full reconciliation from raw CSV bytes: parse both feeds,
    /// build the desired state, snapshot the directory, and reconcile.
    pub async fn execute_sync(
        &self,
        roster_bytes: &[u8],
        mapping_bytes: &[u8],
        dry_run: bool,
        force: bool,
    ) -> Result<SyncResult> {
        let mut logs = Vec::new();
        let mode = if dry_run {
            "DRY RUN"
        } else if force {
            "FORCE"
        } else {
            "NORMAL"
        };
        logs.push(format!("Starting synchronization in {mode} mode."));
        if dry_run {
            logs.push("Dry run: no changes will be made to users or grants.".to_string());
        }

        let rows = parse_roster(roster_bytes)?;
        let mappings = parse_mappings(mapping_bytes)?;
        logs.push(format!(
            "Parsed {} roster rows and {} group mappings.",
            rows.len(),
            mappings.len()
        ));

        let desired = warden_core::roster::desired::build_desired_state(&rows, &mappings, &mut logs);
        let actual = ActualState::load(&self.client, &mut logs).await?;

        Ok(self.reconcile(&desired, &actual, dry_run, logs).await)
    }
}
