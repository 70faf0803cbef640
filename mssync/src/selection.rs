//! Table selection resolution.
//!
//! The selection grammar is a comma list of tokens: `all` or `*` for every
//! candidate, `schema.table` for one table, a schema name for every table in
//! it, or a bare table name matching `dbo.<name>`. Matching is
//! case-insensitive and candidates are the base tables present in BOTH the
//! source and the target.

use std::collections::HashSet;

use mssync_tds::TableRef;
use tracing::debug;

/// Resolves selection tokens against the source and target table lists.
///
/// Candidates keep the source enumeration order, which also fixes how the
/// positional `--start-row` offsets line up.
pub fn resolve(
    tokens: &[String],
    source_tables: &[TableRef],
    target_tables: &[TableRef],
) -> Vec<TableRef> {
    let target_set: HashSet<&TableRef> = target_tables.iter().collect();
    let candidates: Vec<&TableRef> = source_tables
        .iter()
        .filter(|t| target_set.contains(*t))
        .collect();

    let tokens: Vec<&str> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let select_all = tokens.is_empty()
        || tokens
            .iter()
            .any(|t| t.eq_ignore_ascii_case("all") || *t == "*");

    let resolved: Vec<TableRef> = candidates
        .into_iter()
        .filter(|table| select_all || tokens.iter().any(|token| matches(token, table)))
        .cloned()
        .collect();

    debug!(tables = resolved.len(), "resolved table selection");
    resolved
}

fn matches(token: &str, table: &TableRef) -> bool {
    if token.contains('.') {
        return token.eq_ignore_ascii_case(&table.qualified());
    }
    token.eq_ignore_ascii_case(table.schema())
        || (table.schema().eq_ignore_ascii_case("dbo") && token.eq_ignore_ascii_case(table.name()))
}
