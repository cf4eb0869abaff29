//! Desired-state builder: merges roster rows and group mappings into the
//! target configuration for a reconciliation run.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::mapping::GroupMappings;
use crate::roster::rows::RosterRow;

/// Target configuration for a single user: the first-seen display name from
/// the roster plus the union of role-sets per scope.
///
/// Wildcard scopes (`"*"`) are stored verbatim and resolved against the
/// organization-root scope at comparison time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredUser {
    pub username: String,
    pub scopes: BTreeMap<String, BTreeSet<String>>,
}

/// Desired membership/role state keyed by lower-cased email.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    users: BTreeMap<String, DesiredUser>,
}

impl DesiredState {
    pub fn contains(&self, email_key: &str) -> bool {
        self.users.contains_key(email_key)
    }

    pub fn get(&self, email_key: &str) -> Option<&DesiredUser> {
        self.users.get(email_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DesiredUser)> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Insert-or-merge a single (email, scope, roles) target. Used by tests
    /// and the protocol adapter; the bulk path goes through
    /// [`build_desired_state`].
    pub fn add_scope_roles(
        &mut self,
        email: &str,
        username: &str,
        scope: &str,
        roles: impl IntoIterator<Item = String>,
    ) {
        let entry = self
            .users
            .entry(email.to_lowercase())
            .or_insert_with(|| DesiredUser {
                username: username.to_string(),
                scopes: BTreeMap::new(),
            });
        entry
            .scopes
            .entry(scope.to_string())
            .or_default()
            .extend(roles);
    }
}

/// Build the desired state from parsed roster rows and the mapping table.
///
/// Every roster row inserts its user — membership in the roster alone decides
/// create/deactivate. Rows whose group has no mapping are logged and skipped
/// for role accumulation (partial mapping coverage is expected, not an
/// error). Multiple rows for the same user+scope union their role-sets.
pub fn build_desired_state(
    rows: &[RosterRow],
    mappings: &GroupMappings,
    logs: &mut Vec<String>,
) -> DesiredState {
    let mut state = DesiredState::default();

    for row in rows {
        let key = row.email.to_lowercase();
        let entry = state.users.entry(key).or_insert_with(|| DesiredUser {
            username: row.name.clone(),
            scopes: BTreeMap::new(),
        });

        let Some(mapping) = mappings.get(&row.group) else {
            logs.push(format!(
                "No mapping found for group '{}' (user {}); skipping role assignment.",
                row.group, row.email
            ));
            continue;
        };

        for scope in &mapping.scopes {
            entry
                .scopes
                .entry(scope.clone())
                .or_default()
                .extend(mapping.roles.iter().cloned());
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, email: &str, group: &str) -> RosterRow {
        RosterRow {
            name: name.to_string(),
            email: email.to_string(),
            group: group.to_string(),
        }
    }

    fn mappings() -> GroupMappings {
        let mut m = GroupMappings::new();
        m.insert("eng", "org=1", "dev,viewer");
        m.insert("ops", "org=1", "admin");
        m.insert("readers", "org=1", "read");
        m.insert("writers", "org=1", "write");
        m.insert("everyone", "*", "viewer");
        m
    }

    #[test]
    fn single_row_builds_single_target() {
        let mut logs = Vec::new();
        let state = build_desired_state(&[row("Ann Lee", "ann@x.com", "eng")], &mappings(), &mut logs);
        assert_eq!(state.len(), 1);
        let ann = state.get("ann@x.com").unwrap();
        assert_eq!(ann.username, "Ann Lee");
        let roles = ann.scopes.get("org=1").unwrap();
        assert_eq!(
            roles,
            &BTreeSet::from(["dev".to_string(), "viewer".to_string()])
        );
        assert!(logs.is_empty());
    }

    #[test]
    fn email_key_is_lowercased() {
        let mut logs = Vec::new();
        let state = build_desired_state(&[row("Ann", "Ann@X.com", "eng")], &mappings(), &mut logs);
        assert!(state.contains("ann@x.com"));
        assert!(!state.contains("Ann@X.com"));
    }

    #[test]
    fn same_scope_rows_union_role_sets() {
        let mut logs = Vec::new();
        let state = build_desired_state(
            &[
                row("Ann", "ann@x.com", "readers"),
                row("Ann", "ann@x.com", "writers"),
            ],
            &mappings(),
            &mut logs,
        );
        assert_eq!(state.len(), 1);
        let roles = state.get("ann@x.com").unwrap().scopes.get("org=1").unwrap();
        assert_eq!(
            roles,
            &BTreeSet::from(["read".to_string(), "write".to_string()])
        );
    }

    #[test]
    fn first_seen_username_wins() {
        let mut logs = Vec::new();
        let state = build_desired_state(
            &[
                row("Ann Lee", "ann@x.com", "eng"),
                row("A. Lee", "ann@x.com", "ops"),
            ],
            &mappings(),
            &mut logs,
        );
        assert_eq!(state.get("ann@x.com").unwrap().username, "Ann Lee");
    }

    #[test]
    fn unmapped_group_logs_and_keeps_user() {
        let mut logs = Vec::new();
        let state =
            build_desired_state(&[row("Bob", "bob@x.com", "mystery")], &mappings(), &mut logs);
        let bob = state.get("bob@x.com").unwrap();
        assert!(bob.scopes.is_empty());
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("mystery"));
        assert!(logs[0].contains("bob@x.com"));
    }

    #[test]
    fn wildcard_scope_stored_verbatim() {
        let mut logs = Vec::new();
        let state =
            build_desired_state(&[row("Cat", "cat@x.com", "everyone")], &mappings(), &mut logs);
        let cat = state.get("cat@x.com").unwrap();
        assert!(cat.scopes.contains_key("*"));
    }

    #[test]
    fn multi_scope_mapping_fans_out() {
        let mut m = GroupMappings::new();
        m.insert("platform", "org=1,app=7", "operator");
        let mut logs = Vec::new();
        let state = build_desired_state(&[row("Dee", "dee@x.com", "platform")], &m, &mut logs);
        let dee = state.get("dee@x.com").unwrap();
        assert_eq!(dee.scopes.len(), 2);
        assert!(dee.scopes.contains_key("org=1"));
        assert!(dee.scopes.contains_key("app=7"));
    }

    #[test]
    fn add_scope_roles_merges() {
        let mut state = DesiredState::default();
        state.add_scope_roles("Ann@X.com", "Ann", "org=1", vec!["dev".to_string()]);
        state.add_scope_roles("ann@x.com", "ignored", "org=1", vec!["viewer".to_string()]);
        let ann = state.get("ann@x.com").unwrap();
        assert_eq!(ann.username, "Ann");
        assert_eq!(ann.scopes.get("org=1").unwrap().len(), 2);
    }
}
