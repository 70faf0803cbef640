use std::collections::HashSet;

use mssync_config::{ColumnMappings, IgnoreSet};
use mssync_tds::{ColumnInfo, TableRef};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::report::SchemaDrift;

/// One column of the effective projection: the source column it reads and
/// the target column it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionEntry {
    pub source: String,
    pub target: String,
}

/// The ordered list of target columns the sync will touch, with the
/// source column feeding each one. Target names are unique
/// (case-insensitively) and every one exists in the target table.
#[derive(Debug, Clone)]
pub struct Projection {
    entries: Vec<ProjectionEntry>,
}

impl Projection {
    pub(crate) fn new(entries: Vec<ProjectionEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ProjectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Target column names in projection order.
    pub fn target_columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.target.as_str())
    }

    pub fn contains_target(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.target.eq_ignore_ascii_case(name))
    }

    /// The target column a given source column feeds, if any.
    pub fn target_for_source(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.source.eq_ignore_ascii_case(source))
            .map(|e| e.target.as_str())
    }

    /// First entry, used as the paging order when no primary-key ordering is
    /// requested.
    pub fn first(&self) -> Option<&ProjectionEntry> {
        self.entries.first()
    }
}

/// A primary-key column in both name spaces: `source` as probed from the
/// source table, `target` as written into anti-join SQL against the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub source: String,
    pub target: String,
}

/// Result of schema reconciliation for one table.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub projection: Projection,
    pub primary_key: Vec<ColumnPair>,
    pub drift: SchemaDrift,
}

/// Builds the effective projection for one table.
///
/// Source columns are walked in ordinal order: ignored columns drop out
/// first, then each remaining column maps to its target name (identity when
/// unmapped) and joins the projection if that target column exists, is
/// writable and is not already claimed by an earlier entry. Everything that
/// falls out lands in the drift record. The `target_columns_only` flag
/// requests a projection restricted to existing target columns, which is
/// what this construction produces in both modes; the flag therefore only
/// documents intent here.
pub fn reconcile(
    table: &TableRef,
    source_columns: &[ColumnInfo],
    target_columns: &[ColumnInfo],
    pk_source_columns: &[String],
    mappings: &ColumnMappings,
    ignores: &IgnoreSet,
    _target_columns_only: bool,
) -> SyncResult<Reconciled> {
    let table_key = table.lookup_key();
    let mut drift = SchemaDrift::default();

    for col in source_columns.iter().chain(target_columns.iter()) {
        if !col.is_projectable()
            && !drift
                .excluded_columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&col.name))
        {
            drift.excluded_columns.push(col.name.clone());
        }
    }

    let writable_target: Vec<&ColumnInfo> = target_columns
        .iter()
        .filter(|c| c.is_projectable())
        .collect();

    let mut entries = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    for col in source_columns.iter().filter(|c| c.is_projectable()) {
        if ignores.contains(&table_key, &col.name) {
            continue;
        }

        let wanted = mappings
            .target_for(&table_key, &col.name)
            .unwrap_or(&col.name);

        let target_col = writable_target
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted));

        match target_col {
            Some(target_col) if !claimed.contains(&target_col.name.to_lowercase()) => {
                claimed.insert(target_col.name.to_lowercase());
                entries.push(ProjectionEntry {
                    source: col.name.clone(),
                    target: target_col.name.clone(),
                });
            }
            _ => drift.missing_columns_in_target.push(col.name.clone()),
        }
    }

    drift.missing_columns_in_source = writable_target
        .iter()
        .filter(|c| !claimed.contains(&c.name.to_lowercase()))
        .map(|c| c.name.clone())
        .collect();
    drift.common_columns = entries.iter().map(|e| e.target.clone()).collect();

    if entries.is_empty() {
        bail!(
            ErrorKind::EmptyProjection,
            "No common columns between source and target",
            table.qualified()
        );
    }

    let projection = Projection { entries };

    let mut primary_key = Vec::new();
    for pk in pk_source_columns {
        match projection.target_for_source(pk) {
            Some(target) => primary_key.push(ColumnPair {
                source: pk.clone(),
                target: target.to_string(),
            }),
            None => bail!(
                ErrorKind::PrimaryKeyNotRepresentable,
                "Primary key is not representable in the target",
                format!("{table}: key column `{pk}` has no projection entry")
            ),
        }
    }

    Ok(Reconciled {
        projection,
        primary_key,
        drift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ordinal: i32) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            ordinal,
            is_identity: false,
            is_computed: false,
            is_generated_always: false,
        }
    }

    fn computed(name: &str, ordinal: i32) -> ColumnInfo {
        ColumnInfo {
            is_computed: true,
            ..col(name, ordinal)
        }
    }

    fn cols(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| col(n, i as i32 + 1))
            .collect()
    }

    fn no_mappings() -> ColumnMappings {
        ColumnMappings::default()
    }

    fn no_ignores() -> IgnoreSet {
        IgnoreSet::default()
    }

    #[test]
    fn identical_schemas_reconcile_to_identity() {
        let table = TableRef::parse("dbo.Users");
        let source = cols(&["Id", "Name", "Email"]);
        let target = cols(&["Id", "Name", "Email"]);
        let pk = vec!["Id".to_string()];

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &pk,
            &no_mappings(),
            &no_ignores(),
            false,
        )
        .unwrap();

        let targets: Vec<&str> = reconciled.projection.target_columns().collect();
        assert_eq!(targets, ["Id", "Name", "Email"]);
        for entry in reconciled.projection.entries() {
            assert_eq!(entry.source, entry.target);
        }
        assert!(reconciled.drift.missing_columns_in_target.is_empty());
        assert!(reconciled.drift.missing_columns_in_source.is_empty());
        assert_eq!(reconciled.primary_key.len(), 1);
    }

    #[test]
    fn mapping_and_ignore_shape_the_projection() {
        // Source (Id, FullName, Secret) → target (UserId, DisplayName).
        let table = TableRef::parse("dbo.U");
        let source = cols(&["Id", "FullName", "Secret"]);
        let target = cols(&["UserId", "DisplayName"]);

        let mut mappings = ColumnMappings::default();
        mappings.add_directive("dbo.U.Id=UserId").unwrap();
        mappings.add_directive("dbo.U.FullName=DisplayName").unwrap();
        let mut ignores = IgnoreSet::default();
        ignores.add_directive("Secret").unwrap();

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &["Id".to_string()],
            &mappings,
            &ignores,
            false,
        )
        .unwrap();

        let targets: Vec<&str> = reconciled.projection.target_columns().collect();
        assert_eq!(targets, ["UserId", "DisplayName"]);
        assert_eq!(
            reconciled.projection.target_for_source("Id"),
            Some("UserId")
        );
        // Ignored columns are removed, not reported missing.
        assert!(reconciled.drift.missing_columns_in_target.is_empty());
        assert_eq!(reconciled.primary_key[0].target, "UserId");
    }

    #[test]
    fn unrepresentable_source_columns_land_in_drift() {
        let table = TableRef::parse("dbo.Users");
        let source = cols(&["Id", "Email"]);
        let target = cols(&["Id"]);

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &["Id".to_string()],
            &no_mappings(),
            &no_ignores(),
            false,
        )
        .unwrap();

        assert_eq!(reconciled.drift.missing_columns_in_target, ["Email"]);
        let targets: Vec<&str> = reconciled.projection.target_columns().collect();
        assert_eq!(targets, ["Id"]);
    }

    #[test]
    fn unfilled_target_columns_land_in_drift() {
        let table = TableRef::parse("dbo.Users");
        let source = cols(&["Id"]);
        let target = cols(&["Id", "CreatedAt"]);

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &["Id".to_string()],
            &no_mappings(),
            &no_ignores(),
            false,
        )
        .unwrap();

        assert_eq!(reconciled.drift.missing_columns_in_source, ["CreatedAt"]);
        assert!(!reconciled.projection.contains_target("CreatedAt"));
    }

    #[test]
    fn computed_columns_are_excluded_everywhere() {
        let table = TableRef::parse("dbo.Users");
        let source = vec![col("Id", 1), computed("FullName", 2)];
        let target = vec![col("Id", 1), computed("FullName", 2)];

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &["Id".to_string()],
            &no_mappings(),
            &no_ignores(),
            false,
        )
        .unwrap();

        assert!(!reconciled.projection.contains_target("FullName"));
        assert_eq!(reconciled.drift.excluded_columns, ["FullName"]);
    }

    #[test]
    fn duplicate_target_claims_keep_the_first() {
        let table = TableRef::parse("dbo.T");
        let source = cols(&["A", "B"]);
        let target = cols(&["X"]);

        let mut mappings = ColumnMappings::default();
        mappings.add_directive("dbo.T.A=X").unwrap();
        mappings.add_directive("dbo.T.B=X").unwrap();

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &[],
            &mappings,
            &no_ignores(),
            false,
        )
        .unwrap();

        assert_eq!(reconciled.projection.len(), 1);
        assert_eq!(reconciled.projection.entries()[0].source, "A");
        assert_eq!(reconciled.drift.missing_columns_in_target, ["B"]);
    }

    #[test]
    fn pk_column_lost_to_ignore_fails_the_table() {
        let table = TableRef::parse("dbo.Users");
        let source = cols(&["Id", "Name"]);
        let target = cols(&["Id", "Name"]);

        let mut ignores = IgnoreSet::default();
        ignores.add_directive("Id").unwrap();

        let err = reconcile(
            &table,
            &source,
            &target,
            &["Id".to_string()],
            &no_mappings(),
            &ignores,
            false,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PrimaryKeyNotRepresentable);
    }

    #[test]
    fn disjoint_schemas_fail_with_empty_projection() {
        let table = TableRef::parse("dbo.T");
        let source = cols(&["A"]);
        let target = cols(&["B"]);

        let err = reconcile(
            &table,
            &source,
            &target,
            &[],
            &no_mappings(),
            &no_ignores(),
            false,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyProjection);
    }

    #[test]
    fn pk_translates_through_mapping() {
        let table = TableRef::parse("dbo.U");
        let source = cols(&["Id", "Name"]);
        let target = cols(&["UserId", "Name"]);

        let mut mappings = ColumnMappings::default();
        mappings.add_directive("dbo.U.Id=UserId").unwrap();

        let reconciled = reconcile(
            &table,
            &source,
            &target,
            &["Id".to_string()],
            &mappings,
            &no_ignores(),
            false,
        )
        .unwrap();

        assert_eq!(
            reconciled.primary_key,
            vec![ColumnPair {
                source: "Id".to_string(),
                target: "UserId".to_string()
            }]
        );
    }
}
