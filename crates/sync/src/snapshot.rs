//! Per-run immutable snapshot of remote directory state.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use warden_core::error::Result;
use warden_core::models::user::DirectoryUser;

use crate::client::DirectoryClient;
use crate::models::UserGrants;

/// The live directory state at the start of a reconciliation run, keyed by
/// lower-cased email. Built once per run and passed by argument, so the
/// engine is a pure function of two snapshots plus a client capability.
#[derive(Debug, Default)]
pub struct ActualState {
    users: HashMap<String, DirectoryUser>,
}

impl ActualState {
    /// Fetch every remote user regardless of status. A duplicate email is
    /// logged and dropped; the first record wins.
    pub async fn load(client: &DirectoryClient, logs: &mut Vec<String>) -> Result<Self> {
        let users = client.list_all_users(None).await?;
        Ok(Self::from_users(users, logs))
    }

    /// Build a snapshot from already-fetched user records.
    pub fn from_users(users: Vec<DirectoryUser>, logs: &mut Vec<String>) -> Self {
        let mut map: HashMap<String, DirectoryUser> = HashMap::with_capacity(users.len());
        for user in users {
            let key = user.email_key();
            if map.contains_key(&key) {
                warn!(email = %user.email, "duplicate email in directory snapshot");
                logs.push(format!(
                    "Duplicate directory record for {}; keeping the first.",
                    user.email
                ));
                continue;
            }
            map.insert(key, user);
        }
        Self { users: map }
    }

    pub fn get(&self, email: &str) -> Option<&DirectoryUser> {
        self.users.get(&email.to_lowercase())
    }

    pub fn users(&self) -> impl Iterator<Item = &DirectoryUser> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Group a user's grants by scope into `scope -> role slug -> grant id`.
///
/// The inner map is what the grant diff revokes from (by grant id) and
/// compares against (by role-slug set). Zero grants is an empty map, not an
/// error.
pub fn group_grants_by_scope(grants: &[UserGrants]) -> BTreeMap<String, BTreeMap<String, i64>> {
    let mut by_scope: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    for user_grants in grants {
        for grant in &user_grants.grants {
            by_scope
                .entry(grant.scope.clone())
                .or_default()
                .insert(grant.role.slug.clone(), grant.id);
        }
    }
    by_scope
}
