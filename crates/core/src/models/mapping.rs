use std::collections::{BTreeMap, BTreeSet};

/// The scopes and role-set a directory group maps onto.
///
/// Scopes may include the `"*"` wildcard, which is resolved to the
/// organization-root scope at comparison time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMapping {
    pub scopes: Vec<String>,
    pub roles: BTreeSet<String>,
}

/// Immutable group-to-(scopes, roles) table, loaded once per sync invocation.
#[derive(Debug, Clone, Default)]
pub struct GroupMappings {
    entries: BTreeMap<String, GroupMapping>,
}

impl GroupMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping row. The scope field supports comma-separated
    /// multi-scope values; roles are a comma-separated set. A repeated group
    /// name replaces the earlier entry (last row wins).
    pub fn insert(&mut self, group: &str, scope_field: &str, roles_field: &str) {
        let scopes: Vec<String> = scope_field
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let roles: BTreeSet<String> = roles_field
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        self.entries
            .insert(group.trim().to_string(), GroupMapping { scopes, roles });
    }

    pub fn get(&self, group: &str) -> Option<&GroupMapping> {
        self.entries.get(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GroupMapping)> {
        self.entries.iter()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
