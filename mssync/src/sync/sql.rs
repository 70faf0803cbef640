//! SQL text builders for the sync paths.
//!
//! Identifiers are always bracket-quoted and table names render as
//! `[schema].[name]`. Everything interpolated here comes from catalog
//! metadata or engine-generated names, never from row data; row data moves
//! through bulk loads and typed parameters only.

use mssync_tds::{TableRef, quote_ident};

use crate::schema::{ColumnPair, Projection};

/// The key an anti-join insert matches on.
pub enum AntiJoinKey<'a> {
    /// Primary-key columns, compared with plain equality (PK columns are
    /// non-nullable by definition).
    Columns(&'a [ColumnPair]),
    /// Deep compare: the whole projection tuple, matched null-safely via
    /// `INTERSECT` so `NULL` equals `NULL`.
    FullTuple,
}

/// `[source] AS [target]` select list over the projection; the alias is
/// omitted when the names already agree, so the reader always exposes
/// target-space column names.
pub fn select_list(projection: &Projection) -> String {
    projection
        .entries()
        .iter()
        .map(|e| {
            if e.source.eq_ignore_ascii_case(&e.target) {
                quote_ident(&e.source)
            } else {
                format!("{} AS {}", quote_ident(&e.source), quote_ident(&e.target))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_list(columns: impl Iterator<Item = impl AsRef<str>>) -> String {
    columns
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One page of the source table under a deterministic order.
pub fn batch_select(
    table: &TableRef,
    projection: &Projection,
    order_by: &[String],
    offset: u64,
    fetch: u64,
) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {} OFFSET {offset} ROWS FETCH NEXT {fetch} ROWS ONLY",
        select_list(projection),
        table.bracketed(),
        column_list(order_by.iter()),
    )
}

/// The whole source table, for the bulk-refresh reader.
pub fn full_select(table: &TableRef, projection: &Projection) -> String {
    format!(
        "SELECT {} FROM {}",
        select_list(projection),
        table.bracketed()
    )
}

/// A fresh session-private staging table name for one batch.
pub fn staging_name(table: &TableRef) -> String {
    let base: String = table
        .name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("#mssync_{}_{:08x}", base, rand::random::<u32>())
}

/// Clones the projection's column structure (names and types) from the
/// target table into an empty staging table.
pub fn staging_clone(staging: &str, target: &TableRef, projection: &Projection) -> String {
    format!(
        "SELECT TOP (0) {} INTO {} FROM {}",
        column_list(projection.target_columns()),
        quote_ident(staging),
        target.bracketed()
    )
}

pub fn drop_staging(staging: &str) -> String {
    format!("DROP TABLE {}", quote_ident(staging))
}

/// The set-difference insert: every staged row whose key tuple is absent
/// from the target is inserted, everything else is left untouched.
pub fn anti_join_insert(
    target: &TableRef,
    staging: &str,
    projection: &Projection,
    key: &AntiJoinKey<'_>,
) -> String {
    let columns = column_list(projection.target_columns());
    let match_predicate = match key {
        AntiJoinKey::Columns(pairs) => pairs
            .iter()
            .map(|pair| {
                let col = quote_ident(&pair.target);
                format!("t.{col} = s.{col}")
            })
            .collect::<Vec<_>>()
            .join(" AND "),
        AntiJoinKey::FullTuple => {
            let s_tuple = projection
                .target_columns()
                .map(|c| format!("s.{}", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            let t_tuple = projection
                .target_columns()
                .map(|c| format!("t.{}", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("EXISTS (SELECT {s_tuple} INTERSECT SELECT {t_tuple})")
        }
    };

    format!(
        "INSERT INTO {target} ({columns}) \
         SELECT {columns} FROM {staging} AS s \
         WHERE NOT EXISTS (SELECT 1 FROM {target} AS t WHERE {match_predicate})",
        target = target.bracketed(),
        staging = quote_ident(staging),
    )
}

/// Unconditional insert of the staged rows, used by the bulk-refresh path
/// after the target was cleared.
pub fn insert_from_staging(target: &TableRef, staging: &str, projection: &Projection) -> String {
    let columns = column_list(projection.target_columns());
    format!(
        "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
        target.bracketed(),
        quote_ident(staging)
    )
}

pub fn set_identity_insert(table: &TableRef, on: bool) -> String {
    format!(
        "SET IDENTITY_INSERT {} {}",
        table.bracketed(),
        if on { "ON" } else { "OFF" }
    )
}

pub fn truncate(table: &TableRef) -> String {
    format!("TRUNCATE TABLE {}", table.bracketed())
}

pub fn delete_all(table: &TableRef) -> String {
    format!("DELETE FROM {}", table.bracketed())
}

pub fn nocheck_constraints(table: &TableRef) -> String {
    format!("ALTER TABLE {} NOCHECK CONSTRAINT ALL", table.bracketed())
}

pub fn check_constraints(table: &TableRef) -> String {
    format!(
        "ALTER TABLE {} WITH CHECK CHECK CONSTRAINT ALL",
        table.bracketed()
    )
}

pub fn versioning_off(base: &TableRef) -> String {
    format!(
        "ALTER TABLE {} SET (SYSTEM_VERSIONING = OFF)",
        base.bracketed()
    )
}

pub fn versioning_on(base: &TableRef, history: &TableRef) -> String {
    format!(
        "ALTER TABLE {} SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = {}, DATA_CONSISTENCY_CHECK = OFF))",
        base.bracketed(),
        history.bracketed()
    )
}
