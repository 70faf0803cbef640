use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing mapping and ignore directives.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error(
        "invalid column mapping `{0}`, expected `schema.table.source=target`, \
         `table.source=target` or `source=target`"
    )]
    InvalidMapping(String),

    #[error(
        "invalid ignore directive `{0}`, expected `schema.table.column`, \
         `table.column` or `column`"
    )]
    InvalidIgnore(String),
}

/// Canonical key for per-table directive maps: lowercase `schema.table`,
/// with a bare table name defaulting to the `dbo` schema.
fn table_key(schema: Option<&str>, table: &str) -> String {
    format!(
        "{}.{}",
        schema.unwrap_or("dbo").to_lowercase(),
        table.to_lowercase()
    )
}

/// Source→target column renames, applied before projecting onto the target.
///
/// Lookups are case-insensitive on both the table and the source column. A
/// per-table entry wins over a global one; a source column with no entry maps
/// to its own name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnMappings {
    per_table: HashMap<String, HashMap<String, String>>,
    global: HashMap<String, String>,
}

impl ColumnMappings {
    /// Parses one `--map-column` directive.
    pub fn add_directive(&mut self, directive: &str) -> Result<(), DirectiveError> {
        let invalid = || DirectiveError::InvalidMapping(directive.to_string());

        let (lhs, target) = directive.split_once('=').ok_or_else(invalid)?;
        let target = target.trim();
        if target.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<&str> = lhs.trim().split('.').collect();
        match parts.as_slice() {
            [schema, table, source] if !source.is_empty() => {
                self.per_table
                    .entry(table_key(Some(schema), table))
                    .or_default()
                    .insert(source.to_lowercase(), target.to_string());
            }
            [table, source] if !source.is_empty() => {
                self.per_table
                    .entry(table_key(None, table))
                    .or_default()
                    .insert(source.to_lowercase(), target.to_string());
            }
            [source] if !source.is_empty() => {
                self.global.insert(source.to_lowercase(), target.to_string());
            }
            _ => return Err(invalid()),
        }

        Ok(())
    }

    /// Target column name for `source_col` on the table identified by
    /// `table_key` (lowercase `schema.table`), or `None` when unmapped.
    pub fn target_for(&self, table_key: &str, source_col: &str) -> Option<&str> {
        let source = source_col.to_lowercase();
        self.per_table
            .get(table_key)
            .and_then(|m| m.get(&source))
            .or_else(|| self.global.get(&source))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.per_table.is_empty() && self.global.is_empty()
    }
}

/// Columns excluded from every projection, per table or globally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IgnoreSet {
    per_table: HashMap<String, HashSet<String>>,
    global: HashSet<String>,
}

impl IgnoreSet {
    /// Parses one `--ignore-column` directive.
    pub fn add_directive(&mut self, directive: &str) -> Result<(), DirectiveError> {
        let invalid = || DirectiveError::InvalidIgnore(directive.to_string());

        let parts: Vec<&str> = directive.trim().split('.').collect();
        match parts.as_slice() {
            [schema, table, column] if !column.is_empty() => {
                self.per_table
                    .entry(table_key(Some(schema), table))
                    .or_default()
                    .insert(column.to_lowercase());
            }
            [table, column] if !column.is_empty() => {
                self.per_table
                    .entry(table_key(None, table))
                    .or_default()
                    .insert(column.to_lowercase());
            }
            [column] if !column.is_empty() => {
                self.global.insert(column.to_lowercase());
            }
            _ => return Err(invalid()),
        }

        Ok(())
    }

    /// Whether `column` is ignored for the table identified by `table_key`.
    pub fn contains(&self, table_key: &str, column: &str) -> bool {
        let column = column.to_lowercase();
        self.global.contains(&column)
            || self
                .per_table
                .get(table_key)
                .is_some_and(|cols| cols.contains(&column))
    }

    pub fn is_empty(&self) -> bool {
        self.per_table.is_empty() && self.global.is_empty()
    }
}
