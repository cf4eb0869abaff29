//! CSV row structs for the user roster and group-mapping feeds.
//!
//! The roster feed carries `name,email,group` columns; the mapping feed
//! carries `group,scope,roles`. Fields are trimmed on read; empty fields stay
//! empty strings rather than dropping the row.

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::error::{Result, WardenError};
use crate::models::mapping::GroupMappings;

/// One row of the user roster feed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RosterRow {
    pub name: String,
    pub email: String,
    pub group: String,
}

/// One row of the group-mapping feed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MappingRow {
    pub group: String,
    pub scope: String,
    pub roles: String,
}

/// Parse the roster CSV. A malformed row is fatal and reported with its
/// 1-based data-row index, before any mutation happens.
pub fn parse_roster(bytes: &[u8]) -> Result<Vec<RosterRow>> {
    read_rows(bytes)
}

/// Parse the mapping CSV into a [`GroupMappings`] table (last row wins for a
/// repeated group name).
pub fn parse_mappings(bytes: &[u8]) -> Result<GroupMappings> {
    let rows: Vec<MappingRow> = read_rows(bytes)?;
    let mut mappings = GroupMappings::new();
    for row in &rows {
        mappings.insert(&row.group, &row.scope, &row.roles);
    }
    Ok(mappings)
}

fn read_rows<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(bytes);

    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize().enumerate() {
        let row: T = result.map_err(|e| WardenError::MalformedInput {
            row: idx + 1,
            reason: e.to_string(),
        })?;
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roster_rows() {
        let csv = b"name,email,group\nAnn Lee,ann@x.com,eng\nBob Jones,bob@x.com,ops\n";
        let rows = parse_roster(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Ann Lee");
        assert_eq!(rows[0].email, "ann@x.com");
        assert_eq!(rows[1].group, "ops");
    }

    #[test]
    fn fields_are_trimmed() {
        let csv = b"name,email,group\n  Ann Lee , ann@x.com ,  eng \n";
        let rows = parse_roster(csv).unwrap();
        assert_eq!(rows[0].name, "Ann Lee");
        assert_eq!(rows[0].email, "ann@x.com");
        assert_eq!(rows[0].group, "eng");
    }

    #[test]
    fn empty_fields_stay_empty_strings() {
        let csv = b"name,email,group\n,ann@x.com,\n";
        let rows = parse_roster(csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "");
        assert_eq!(rows[0].group, "");
    }

    #[test]
    fn short_row_reports_one_based_index() {
        let csv = b"name,email,group\nAnn Lee,ann@x.com,eng\nonly-one-field\n";
        let err = parse_roster(csv).unwrap_err();
        match err {
            WardenError::MalformedInput { row, .. } => assert_eq!(row, 2),
            other => panic!("expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_malformed() {
        let csv = b"name,group\nAnn Lee,eng\n";
        let err = parse_roster(csv).unwrap_err();
        assert!(matches!(err, WardenError::MalformedInput { row: 1, .. }));
    }

    #[test]
    fn parse_mappings_builds_table() {
        let csv = b"group,scope,roles\neng,org=1,\"dev,viewer\"\nops,\"org=1,app=2\",admin\n";
        let mappings = parse_mappings(csv).unwrap();
        assert_eq!(mappings.len(), 2);
        let eng = mappings.get("eng").unwrap();
        assert_eq!(eng.scopes, vec!["org=1"]);
        assert_eq!(eng.roles.len(), 2);
        let ops = mappings.get("ops").unwrap();
        assert_eq!(ops.scopes, vec!["org=1", "app=2"]);
    }

    #[test]
    fn parse_mappings_last_row_wins() {
        let csv = b"group,scope,roles\neng,org=1,dev\neng,org=2,viewer\n";
        let mappings = parse_mappings(csv).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings.get("eng").unwrap().scopes, vec!["org=2"]);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        let rows = parse_roster(b"name,email,group\n").unwrap();
        assert!(rows.is_empty());
    }
}
